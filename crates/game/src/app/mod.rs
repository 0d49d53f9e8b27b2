pub(crate) mod bootstrap;
pub(crate) mod loop_runner;
mod scenario;
mod snapshot;

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    use lifesim_engine::{compile_content_catalog, AppPaths, ContentCatalog, ContentLoadRequest};

    /// Paths of this repository, so tests exercise the shipped content.
    pub(crate) fn repo_app_paths() -> AppPaths {
        AppPaths::for_root(Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join(".."))
    }

    pub(crate) fn compile_demo_catalog() -> ContentCatalog {
        compile_content_catalog(&repo_app_paths(), &ContentLoadRequest::default())
            .expect("shipped content should compile")
    }
}
