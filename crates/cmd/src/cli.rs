use clap::Parser;
use hotels::{AzureContainer, PipelineConfig, SourceRoot};

/// Materialize hotel weather and Expedia data as Delta tables, then compute
/// monthly hotel statistics.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "hotels")]
pub struct Cli {
    /// Azure storage account name
    pub account_name: String,
    /// Azure storage account key
    pub account_key: String,
    /// Container holding the hotel-weather and expedia folders
    pub container: String,
    /// Root for all Delta tables (local path or abfss:// URL)
    pub delta_home: String,
}

impl std::fmt::Debug for Cli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cli")
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .field("container", &self.container)
            .field("delta_home", &self.delta_home)
            .finish()
    }
}

impl Cli {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            source: SourceRoot::Azure(AzureContainer::new(
                self.account_name.clone(),
                self.account_key.clone(),
                self.container.clone(),
            )),
            delta_home: self.delta_home.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_four_positional_arguments() -> Result<(), clap::Error> {
        let cli = Cli::try_parse_from([
            "hotels",
            "acct",
            "key==",
            "data",
            "abfss://delta@acct.dfs.core.windows.net/home",
        ])?;

        let config = cli.pipeline_config();
        match &config.source {
            SourceRoot::Azure(container) => {
                assert_eq!(container.root_url(), "abfss://data@acct.dfs.core.windows.net");
                assert_eq!(container.account_key, "key==");
            }
            SourceRoot::Local(path) => panic!("unexpected local source {path:?}"),
        }
        assert_eq!(
            config.delta_home,
            "abfss://delta@acct.dfs.core.windows.net/home"
        );
        Ok(())
    }

    #[test]
    fn test_missing_arguments_fail() {
        assert!(Cli::try_parse_from(["hotels", "acct", "key", "data"]).is_err());
        assert!(Cli::try_parse_from(["hotels"]).is_err());
    }

    #[test]
    fn test_extra_arguments_fail() {
        assert!(Cli::try_parse_from(["hotels", "a", "b", "c", "d", "e"]).is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let cli = Cli {
            account_name: "acct".to_string(),
            account_key: "s3cr3t".to_string(),
            container: "data".to_string(),
            delta_home: "/tmp/delta".to_string(),
        };
        assert!(!format!("{cli:?}").contains("s3cr3t"));
    }
}
