//! Loader event hooks

/// Observer of a loader's activity
///
/// Every hook defaults to doing nothing; implementors override what they
/// need. Hooks run on the loading thread and must not block.
pub trait LoaderEventListener: Send + Sync {
    fn enumerating_resource_urls(&self, _resource_name: &str, _loader_name: &str) {}

    fn getting_url_from_resource(&self, _resource_name: &str, _loader_name: &str) {}

    fn open_resource_stream(&self, _resource_name: &str, _loader_name: &str) {}

    fn load_unit(&self, _unit_name: &str, _loader_name: &str) {}
}
