//! Module loader scoped to the server bundle's own directory.
//!
//! The bundle is foreign, previously-compiled code: its internal imports must
//! resolve relative to itself, never against the engine's environment, and
//! nothing outside the bundle directory may be loaded. Remote specifiers are
//! rejected outright. The loader itself is stateless; the per-batch module
//! cache lives in the `JsRuntime` and is discarded with it at teardown, so
//! repeated batches cannot see each other's modules.

use deno_core::{
    anyhow::{anyhow, Error},
    ModuleLoadResponse, ModuleLoader, ModuleSource, ModuleSourceCode, ModuleSpecifier,
    ModuleType, RequestedModuleType, ResolutionKind,
};
use std::path::{Path, PathBuf};

/// Loader for one compiled bundle. Every import, static or dynamic, must
/// stay inside the bundle's directory and name a `.js`/`.mjs` file.
pub struct BundleLoader {
    scope: PathBuf,
}

impl BundleLoader {
    /// Builds a loader scoped to `entry`'s parent directory and returns the
    /// canonical specifier for the entry module itself.
    pub fn for_bundle(entry: &Path) -> Result<(Self, ModuleSpecifier), Error> {
        let entry = entry
            .canonicalize()
            .map_err(|e| anyhow!("bundle entry '{}' is not readable: {e}", entry.display()))?;
        let scope = entry
            .parent()
            .ok_or_else(|| anyhow!("bundle entry '{}' has no parent directory", entry.display()))?
            .to_path_buf();
        let specifier = ModuleSpecifier::from_file_path(&entry)
            .map_err(|_| anyhow!("bundle entry '{}' is not a valid path", entry.display()))?;

        let loader = Self { scope };
        loader.validate(&specifier)?;
        Ok((loader, specifier))
    }

    /// Single validation path shared by `resolve` and `load`: file scheme,
    /// contained in the bundle directory (symlinks resolved), JS extension.
    fn validate(&self, specifier: &ModuleSpecifier) -> Result<PathBuf, Error> {
        if specifier.scheme() != "file" {
            return Err(anyhow!(
                "bundle imports must be file-local, got '{specifier}'"
            ));
        }
        let path = specifier
            .to_file_path()
            .map_err(|_| anyhow!("cannot map '{specifier}' to a filesystem path"))?;
        let canonical = path
            .canonicalize()
            .map_err(|e| anyhow!("module '{}' is not readable: {e}", path.display()))?;
        if !canonical.starts_with(&self.scope) {
            return Err(anyhow!(
                "module '{}' is outside the bundle directory",
                path.display()
            ));
        }
        match canonical.extension().and_then(|e| e.to_str()) {
            Some("js") | Some("mjs") => Ok(canonical),
            _ => Err(anyhow!(
                "bundle modules must be .js or .mjs files, got '{}'",
                path.display()
            )),
        }
    }
}

impl ModuleLoader for BundleLoader {
    fn resolve(
        &self,
        specifier: &str,
        referrer: &str,
        _kind: ResolutionKind,
    ) -> Result<ModuleSpecifier, Error> {
        const BLOCKED_PREFIXES: &[&str] = &["http://", "https://", "data:", "blob:", "npm:", "node:"];
        if BLOCKED_PREFIXES.iter().any(|p| specifier.starts_with(p)) {
            return Err(anyhow!(
                "non-local import '{specifier}' is forbidden inside the render sandbox"
            ));
        }

        let resolved = if specifier.starts_with("./") || specifier.starts_with("../") {
            let referrer = ModuleSpecifier::parse(referrer)
                .map_err(|e| anyhow!("invalid referrer '{referrer}': {e}"))?;
            referrer
                .join(specifier)
                .map_err(|e| anyhow!("cannot resolve '{specifier}': {e}"))?
        } else if specifier.starts_with("file://") {
            ModuleSpecifier::parse(specifier)
                .map_err(|e| anyhow!("invalid file URL '{specifier}': {e}"))?
        } else if specifier.starts_with('/') {
            ModuleSpecifier::from_file_path(specifier)
                .map_err(|_| anyhow!("invalid absolute path '{specifier}'"))?
        } else {
            // Bare specifier: a sibling chunk emitted next to the entry.
            ModuleSpecifier::from_file_path(self.scope.join(specifier))
                .map_err(|_| anyhow!("invalid bare specifier '{specifier}'"))?
        };

        self.validate(&resolved)?;
        Ok(resolved)
    }

    fn load(
        &self,
        module_specifier: &ModuleSpecifier,
        _maybe_referrer: Option<&ModuleSpecifier>,
        _is_dyn_import: bool,
        _requested_module_type: RequestedModuleType,
    ) -> ModuleLoadResponse {
        let path = match self.validate(module_specifier) {
            Ok(path) => path,
            Err(e) => return ModuleLoadResponse::Sync(Err(e)),
        };

        let code = match std::fs::read_to_string(&path) {
            Ok(code) => code,
            Err(e) => {
                return ModuleLoadResponse::Sync(Err(anyhow!(
                    "failed to read module '{}': {e}",
                    path.display()
                )));
            }
        };

        ModuleLoadResponse::Sync(Ok(ModuleSource::new(
            ModuleType::JavaScript,
            ModuleSourceCode::String(code.into()),
            module_specifier,
            None,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn bundle_in(dir: &Path) -> (BundleLoader, ModuleSpecifier) {
        let entry = dir.join("entry.js");
        fs::write(&entry, "export default () => '<p>ok</p>';").unwrap();
        BundleLoader::for_bundle(&entry).unwrap()
    }

    #[test]
    fn rejects_remote_and_builtin_specifiers() {
        let dir = tempdir().unwrap();
        let (loader, entry) = bundle_in(dir.path());

        for bad in [
            "https://cdn.example.com/chunk.js",
            "http://localhost/x.js",
            "data:text/javascript,1",
            "npm:react",
            "node:fs",
        ] {
            let result = loader.resolve(bad, entry.as_str(), ResolutionKind::Import);
            assert!(result.is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn rejects_escape_from_bundle_directory() {
        let outer = tempdir().unwrap();
        let bundle_dir = outer.path().join("bundle");
        fs::create_dir(&bundle_dir).unwrap();
        fs::write(outer.path().join("secret.js"), "export default 1;").unwrap();
        let entry = bundle_dir.join("entry.js");
        fs::write(&entry, "export default () => '';").unwrap();

        let (loader, entry) = BundleLoader::for_bundle(&entry).unwrap();
        let result = loader.resolve("../secret.js", entry.as_str(), ResolutionKind::Import);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("outside the bundle directory"));
    }

    #[test]
    fn resolves_relative_and_bare_sibling_chunks() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("chunk-a1b2.js"), "export const n = 1;").unwrap();
        let (loader, entry) = bundle_in(dir.path());

        assert!(loader
            .resolve("./chunk-a1b2.js", entry.as_str(), ResolutionKind::Import)
            .is_ok());
        assert!(loader
            .resolve("chunk-a1b2.js", entry.as_str(), ResolutionKind::Import)
            .is_ok());
    }

    #[test]
    fn rejects_non_module_extensions() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("data.json"), "{}").unwrap();
        let (loader, entry) = bundle_in(dir.path());

        let result = loader.resolve("./data.json", entry.as_str(), ResolutionKind::Import);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains(".js or .mjs"));
    }

    #[test]
    fn entry_must_live_in_a_directory_it_cannot_escape() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.js");
        assert!(BundleLoader::for_bundle(&missing).is_err());
    }
}
