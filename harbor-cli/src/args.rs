//! Command-line arguments and config path resolution.

use std::path::PathBuf;

use crate::error::CliError;

pub const CONFIG_ENV_VAR: &str = "HARBOR_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub refresh: bool,
    pub clear: bool,
    pub help: bool,
    pub urls: Vec<String>,
}

impl CliArgs {
    /// Parse arguments, excluding the program name.
    pub fn parse<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = CliArgs::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    let path = args
                        .next()
                        .ok_or_else(|| CliError::Usage("--config requires a path".to_string()))?;
                    parsed.config_path = Some(PathBuf::from(path));
                }
                "--refresh" => parsed.refresh = true,
                "--clear" => parsed.clear = true,
                "-h" | "--help" => parsed.help = true,
                flag if flag.starts_with("--") => {
                    return Err(CliError::Usage(format!("unknown option {flag}")));
                }
                _ => parsed.urls.push(arg),
            }
        }

        if parsed.urls.is_empty() && !parsed.clear && !parsed.help {
            return Err(CliError::Usage("no URLs given".to_string()));
        }
        Ok(parsed)
    }

    pub fn from_env() -> Result<Self, CliError> {
        Self::parse(std::env::args().skip(1))
    }

    /// `--config` wins over the environment; `None` means built-in defaults.
    pub fn resolve_config_path(&self, env_value: Option<String>) -> Option<PathBuf> {
        self.config_path
            .clone()
            .or_else(|| env_value.filter(|v| !v.is_empty()).map(PathBuf::from))
    }
}
