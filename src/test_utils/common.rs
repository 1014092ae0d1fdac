use std::sync::Once;

use prost::Name;

use crate::proto::PACKAGE;
use crate::proto::TYPE_URL_PREFIX;

static INIT: Once = Once::new();

/// Installs a test writer subscriber once per process; honours `RUST_LOG`.
pub(crate) fn enable_logger() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Echo-style command used by dispatch tests.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Ping {
    #[prost(string, tag = "1")]
    pub text: String,
}

impl Name for Ping {
    const NAME: &'static str = "Ping";
    const PACKAGE: &'static str = PACKAGE;

    fn type_url() -> String {
        format!("{TYPE_URL_PREFIX}{}", Self::full_name())
    }
}

/// Failure payload returned by test handlers.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Failure {
    #[prost(string, tag = "1")]
    pub reason: String,
}

impl Name for Failure {
    const NAME: &'static str = "Failure";
    const PACKAGE: &'static str = PACKAGE;

    fn type_url() -> String {
        format!("{TYPE_URL_PREFIX}{}", Self::full_name())
    }
}
