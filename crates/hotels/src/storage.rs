//! Storage locations: the Azure container holding raw files, and the Delta
//! home where materialized and result tables live.

use crate::error::{PipelineError, Result};
use deltalake::logstore::LogStore as _;
use deltalake::{DeltaTable, DeltaTableBuilder};
use diagnostics::*;
use object_store::ObjectStore;
use object_store::azure::MicrosoftAzureBuilder;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Once};
use url::Url;

/// URL schemes delta-rs routes to Azure
const AZURE_SCHEMES: [&str; 5] = ["abfss", "abfs", "az", "adl", "azure"];

static AZURE_HANDLERS: Once = Once::new();

/// Azure Data Lake Gen2 container with shared-key credentials
#[derive(Clone)]
pub struct AzureContainer {
    pub account_name: String,
    pub account_key: String,
    pub name: String,
}

impl std::fmt::Debug for AzureContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureContainer")
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .field("name", &self.name)
            .finish()
    }
}

impl AzureContainer {
    pub fn new(
        account_name: impl Into<String>,
        account_key: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            account_name: account_name.into(),
            account_key: account_key.into(),
            name: name.into(),
        }
    }

    /// Full blob filesystem URL of the container, without a trailing slash
    pub fn root_url(&self) -> String {
        format!(
            "abfss://{}@{}.dfs.core.windows.net",
            self.name, self.account_name
        )
    }

    /// Storage options delta-rs understands for this account
    pub fn storage_options(&self) -> HashMap<String, String> {
        HashMap::from([
            (
                "azure_storage_account_name".to_string(),
                self.account_name.clone(),
            ),
            (
                "azure_storage_account_key".to_string(),
                self.account_key.clone(),
            ),
        ])
    }

    /// Object store scoped to this container
    pub fn object_store(&self) -> Result<Arc<dyn ObjectStore>> {
        let store = MicrosoftAzureBuilder::new()
            .with_account(&self.account_name)
            .with_access_key(&self.account_key)
            .with_container_name(&self.name)
            .build()?;
        Ok(Arc::new(store))
    }

    pub fn url(&self) -> Result<Url> {
        let root = self.root_url();
        Url::parse(&root).map_err(|source| PipelineError::Url { url: root, source })
    }
}

/// Where the raw source folders live
#[derive(Clone, Debug)]
pub enum SourceRoot {
    Azure(AzureContainer),
    /// Local directory holding the source folders
    Local(PathBuf),
}

impl SourceRoot {
    /// Location of a source folder, with a trailing slash so the engine
    /// lists it as a directory
    pub fn folder_url(&self, folder: &str) -> String {
        let folder = folder.trim_matches('/');
        match self {
            SourceRoot::Azure(container) => format!("{}/{}/", container.root_url(), folder),
            SourceRoot::Local(root) => format!("{}/", root.join(folder).to_string_lossy()),
        }
    }

    pub fn credentials(&self) -> Option<&AzureContainer> {
        match self {
            SourceRoot::Azure(container) => Some(container),
            SourceRoot::Local(_) => None,
        }
    }
}

/// Root under which every Delta table of the pipeline is stored
#[derive(Clone)]
pub struct DeltaHome {
    root: String,
    storage_options: HashMap<String, String>,
}

impl std::fmt::Debug for DeltaHome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.storage_options.keys().collect();
        keys.sort();
        f.debug_struct("DeltaHome")
            .field("root", &self.root)
            .field("storage_options", &keys)
            .finish()
    }
}

impl DeltaHome {
    /// Azure credentials are attached only when the root is an Azure URL.
    pub fn new(root: impl Into<String>, credentials: Option<&AzureContainer>) -> Self {
        let root = root.into();
        let root = match root.trim_end_matches('/') {
            "" => root,
            trimmed => trimmed.to_string(),
        };

        let storage_options = match credentials {
            Some(container) if is_azure_url(&root) => container.storage_options(),
            _ => HashMap::new(),
        };

        Self {
            root,
            storage_options,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn is_remote(&self) -> bool {
        self.root.contains("://")
    }

    pub fn table_uri(&self, table: &str) -> String {
        format!("{}/{}", self.root, table.trim_matches('/'))
    }

    pub fn storage_options(&self) -> HashMap<String, String> {
        self.storage_options.clone()
    }

    /// Open the Delta table at `{root}/{table}`, or `None` when nothing has
    /// been committed there.
    pub async fn open(&self, table: &str) -> Result<Option<DeltaTable>> {
        let uri = self.table_uri(table);
        if self.local_path(table).is_some_and(|path| !path.is_dir()) {
            debug!("no table directory at {uri}");
            return Ok(None);
        }

        let mut table = DeltaTableBuilder::from_valid_uri(&uri)?
            .with_storage_options(self.storage_options())
            .build()?;

        if !table.log_store().is_delta_table_location().await? {
            debug!("no Delta log at {uri}");
            return Ok(None);
        }

        table.load().await?;
        Ok(Some(table))
    }

    pub async fn open_required(&self, table: &str) -> Result<DeltaTable> {
        self.open(table).await?.ok_or_else(|| PipelineError::MissingTable {
            uri: self.table_uri(table),
        })
    }

    /// Make sure a local destination directory exists before delta-rs writes
    /// to it. Remote roots need nothing.
    pub fn prepare(&self, table: &str) -> Result<()> {
        if let Some(path) = self.local_path(table) {
            std::fs::create_dir_all(path)?;
        }
        Ok(())
    }

    /// Filesystem path of a table under a plain path or `file://` root
    fn local_path(&self, table: &str) -> Option<PathBuf> {
        let uri = self.table_uri(table);
        if !self.is_remote() {
            return Some(PathBuf::from(uri));
        }
        Url::parse(&uri)
            .ok()
            .filter(|url| url.scheme() == "file")
            .and_then(|url| url.to_file_path().ok())
    }
}

pub fn is_azure_url(location: &str) -> bool {
    match Url::parse(location) {
        Ok(url) => AZURE_SCHEMES.contains(&url.scheme()),
        Err(_) => false,
    }
}

/// Register the delta-rs Azure object store and log store factories.
/// Repeated calls do nothing.
pub fn register_azure_handlers() {
    AZURE_HANDLERS.call_once(|| {
        info!("registering Delta Lake handlers for Azure schemes");
        deltalake::azure::register_handlers(None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container() -> AzureContainer {
        AzureContainer::new("acct", "c2VjcmV0", "data")
    }

    #[test]
    fn test_container_root_url() {
        assert_eq!(
            container().root_url(),
            "abfss://data@acct.dfs.core.windows.net"
        );
    }

    #[test]
    fn test_folder_urls() {
        let azure = SourceRoot::Azure(container());
        assert_eq!(
            azure.folder_url("hotel-weather"),
            "abfss://data@acct.dfs.core.windows.net/hotel-weather/"
        );

        let local = SourceRoot::Local(PathBuf::from("/tmp/raw"));
        assert_eq!(local.folder_url("/expedia/"), "/tmp/raw/expedia/");
        assert!(local.credentials().is_none());
    }

    #[test]
    fn test_delta_home_table_uri() {
        let home = DeltaHome::new("/tmp/delta/", None);
        assert_eq!(home.root(), "/tmp/delta");
        assert_eq!(home.table_uri("busy_hotels"), "/tmp/delta/busy_hotels");
        assert!(!home.is_remote());
    }

    #[test]
    fn test_storage_options_only_for_azure_roots() {
        let c = container();

        let remote = DeltaHome::new("abfss://out@acct.dfs.core.windows.net/delta", Some(&c));
        let opts = remote.storage_options();
        assert_eq!(
            opts.get("azure_storage_account_name").map(String::as_str),
            Some("acct")
        );
        assert_eq!(
            opts.get("azure_storage_account_key").map(String::as_str),
            Some("c2VjcmV0")
        );
        assert!(remote.is_remote());

        let local = DeltaHome::new("/tmp/delta", Some(&c));
        assert!(local.storage_options().is_empty());

        let s3 = DeltaHome::new("s3://bucket/delta", Some(&c));
        assert!(s3.storage_options().is_empty());
    }

    #[test]
    fn test_debug_hides_account_key() {
        let c = container();
        assert!(!format!("{c:?}").contains("c2VjcmV0"));

        let home = DeltaHome::new("abfss://out@acct.dfs.core.windows.net/delta", Some(&c));
        assert!(!format!("{home:?}").contains("c2VjcmV0"));
    }

    #[test]
    fn test_local_path_of_file_urls() {
        let home = DeltaHome::new("file:///tmp/delta", None);
        assert_eq!(
            home.local_path("expedia"),
            Some(PathBuf::from("/tmp/delta/expedia"))
        );

        let remote = DeltaHome::new("abfss://out@acct.dfs.core.windows.net/delta", None);
        assert_eq!(remote.local_path("expedia"), None);
    }

    #[tokio::test]
    async fn test_open_missing_local_table_is_none() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let root = dir.path().join("not").join("created");
        let home = DeltaHome::new(root.to_string_lossy(), None);

        assert!(home.open("hotel_weather").await?.is_none());
        assert!(!root.exists());

        let home = DeltaHome::new(format!("file://{}", root.display()), None);
        assert!(home.open("hotel_weather").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_open_required_reports_missing_table() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let home = DeltaHome::new(dir.path().join("delta").to_string_lossy(), None);

        match home.open_required("expedia").await {
            Err(PipelineError::MissingTable { uri }) => assert!(uri.ends_with("/expedia")),
            other => panic!("expected MissingTable, got {:?}", other.map(|_| ())),
        }
        Ok(())
    }

    #[test]
    fn test_is_azure_url() {
        assert!(is_azure_url("abfss://c@a.dfs.core.windows.net/x"));
        assert!(is_azure_url("az://c/x"));
        assert!(!is_azure_url("/local/path"));
        assert!(!is_azure_url("file:///local/path"));
    }
}
