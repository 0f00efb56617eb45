//! Shared test utilities for the notification crates
//!
//! This crate provides reusable test infrastructure:
//! - `StalledServer`: a TCP endpoint that accepts requests and never answers,
//!   reporting when the client gives up and closes the connection
//! - `TestDataBuilder`: deterministic test data generation
//! - `assertions`: custom assertion helpers
//!
//! # Usage
//!
//! ```rust,ignore
//! use test_utils::{StalledServer, TestDataBuilder};
//!
//! #[tokio::test]
//! async fn my_timeout_test() {
//!     let server = StalledServer::start().await;
//!     let builder = TestDataBuilder::from_test_name("my_timeout_test");
//!
//!     // spawn a client pointed at server.url()
//!     server.wait_for_request().await;
//!     tokio::time::pause();
//!     // await the client, then:
//!     server.wait_for_disconnect().await;
//! }
//! ```

mod stalled;

pub use stalled::StalledServer;

/// Builder for test data with deterministic values
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    /// Create a new builder with a seed (for deterministic tests)
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_send_receipt");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Generate a deliverable-looking recipient address.
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::new(7);
    /// assert_eq!(builder.recipient("alice"), "alice+7@example.com");
    /// ```
    pub fn recipient(&self, local: &str) -> String {
        format!("{}+{}@example.com", local, self.seed)
    }

    /// Generate a unique subject line for testing
    pub fn subject(&self, topic: &str) -> String {
        format!("test-{}-{}", topic, self.seed)
    }
}

/// Test assertion helpers
pub mod assertions {
    /// Assert that a string contains none of CR, LF or other control characters.
    pub fn assert_no_control_chars(value: &str, context: &str) {
        assert!(
            !value.chars().any(char::is_control),
            "{}: expected no control characters, got {:?}",
            context,
            value
        );
    }

    /// Assert that an optional value is Some
    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }
}
