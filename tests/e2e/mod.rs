// End-to-end tests for text-to-audio
//
// Each test starts local mock servers standing in for the IAM token endpoint
// and the SpeechKit synthesis endpoint, then drives the real HTTP clients,
// credential signer and pipeline against them. Intermediate audio and output
// files live in a per-test temporary directory.

mod helpers;
mod test_iam;
mod test_pipeline;
mod test_speechkit;
