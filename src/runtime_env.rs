use std::{env, fmt};

const ENVIRONMENT_NAME: &str = "ENVIRONMENT_NAME";
const DEPLOYED: &str = "prod";
const LOCAL: &str = "local";

/// Variables set by `cargo lambda watch`, SAM local and LocalStack.
const LOCAL_TOOLING_HINTS: &[&str] = &[
    "AWS_SAM_LOCAL",
    "CARGO_LAMBDA_HTTP_PORT",
    "LOCALSTACK_HOSTNAME",
];

/// Variables the Lambda service sets inside a real execution environment.
const LAMBDA_RUNTIME_HINTS: &[&str] = &[
    "AWS_EXECUTION_ENV",
    "AWS_LAMBDA_FUNCTION_NAME",
    "LAMBDA_TASK_ROOT",
];

/// How a [`DeploymentEnv`] was decided, for the cold-start log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvSource {
    Explicit,
    LocalTooling,
    LambdaRuntime,
    Fallback,
}

impl fmt::Display for EnvSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EnvSource::Explicit => "ENVIRONMENT_NAME",
            EnvSource::LocalTooling => "local tooling variables",
            EnvSource::LambdaRuntime => "Lambda runtime variables",
            EnvSource::Fallback => "no hints, assuming local",
        })
    }
}

/// Name of the environment the proxy runs in (`prod`, `dev`, `local`, ...).
///
/// An explicit `ENVIRONMENT_NAME` wins. Otherwise local tooling hints beat
/// Lambda runtime hints, since `cargo lambda` and SAM emulate the latter.
/// With no hints at all the environment is `local`.
#[derive(Debug, Clone)]
pub struct DeploymentEnv {
    name: String,
    source: EnvSource,
}

impl DeploymentEnv {
    pub fn detect() -> Self {
        Self::detect_with(|key| env::var(key).ok())
    }

    pub fn detect_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let explicit = lookup(ENVIRONMENT_NAME)
            .map(|raw| raw.trim().to_owned())
            .filter(|name| !name.is_empty());
        if let Some(name) = explicit {
            return Self {
                name,
                source: EnvSource::Explicit,
            };
        }

        let any_set = |keys: &[&str]| keys.iter().any(|key| lookup(key).is_some());
        let (name, source) = if any_set(LOCAL_TOOLING_HINTS) {
            (LOCAL, EnvSource::LocalTooling)
        } else if any_set(LAMBDA_RUNTIME_HINTS) {
            (DEPLOYED, EnvSource::LambdaRuntime)
        } else {
            (LOCAL, EnvSource::Fallback)
        };
        Self {
            name: name.to_owned(),
            source,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> EnvSource {
        self.source
    }

    pub fn is_local(&self) -> bool {
        self.name.eq_ignore_ascii_case(LOCAL)
    }

    /// Users table assumed when `USERS_TABLE` is not set.
    pub fn default_users_table(&self) -> String {
        format!("{}-users-table", self.name)
    }
}
