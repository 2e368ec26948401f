/*!
 * Provider client tests
 */

// Anthropic translation and scoring client
pub mod anthropic_test;

// Google Cloud Translation client
pub mod google_test;
