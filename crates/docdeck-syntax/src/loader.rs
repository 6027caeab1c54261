//! Lazy, memoized syntax module loading.
//!
//! ## Learning: Boxed Futures as Values
//!
//! Each registered loader is a function returning a future. Different
//! loaders produce different future types, so they are erased behind
//! `Pin<Box<dyn Future + Send>>` and stored in a map keyed by token.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use crate::{SyntaxModule, SyntaxResult};

/// Future produced by a loader.
pub type LoadFuture = Pin<Box<dyn Future<Output = SyntaxResult<SyntaxModule>> + Send>>;

/// A registered loader for one file-type token.
pub type LoaderFn = Arc<dyn Fn() -> LoadFuture + Send + Sync>;

/// Resolves file-type tokens to syntax modules, loading each one at most
/// once on success.
///
/// Cloning is cheap; clones share the module cache.
#[derive(Clone)]
pub struct SyntaxLoader {
    loaders: Arc<HashMap<String, LoaderFn>>,
    cache: Arc<Mutex<HashMap<String, Arc<SyntaxModule>>>>,
}

impl SyntaxLoader {
    /// Creates a loader with no registrations.
    pub fn empty() -> Self {
        Self {
            loaders: Arc::new(HashMap::new()),
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Creates a loader with the bundled grammars registered.
    pub fn with_builtin() -> Self {
        let mut loader = Self::empty();

        loader.register("rs", builtin("rust", || tree_sitter_rust::LANGUAGE.into()));
        loader.register("go", builtin("go", || tree_sitter_go::LANGUAGE.into()));
        // The C++ grammar accepts plain C as well.
        for token in ["c", "h", "cpp", "hpp"] {
            loader.register(token, builtin("cpp", || tree_sitter_cpp::LANGUAGE.into()));
        }
        loader.register("java", builtin("java", || tree_sitter_java::LANGUAGE.into()));

        for token in ["js", "jsx", "mjs", "cjs"] {
            loader.register(
                token,
                builtin("javascript", || tree_sitter_javascript::LANGUAGE.into()),
            );
        }
        loader.register(
            "ts",
            builtin("typescript", || tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        );
        loader.register("tsx", builtin("tsx", || tree_sitter_typescript::LANGUAGE_TSX.into()));

        for token in ["html", "htm"] {
            loader.register(token, builtin("html", || tree_sitter_html::LANGUAGE.into()));
        }
        for token in ["css", "scss"] {
            loader.register(token, builtin("css", || tree_sitter_css::LANGUAGE.into()));
        }
        for token in ["md", "mdx"] {
            loader.register(token, builtin("markdown", || tree_sitter_md::LANGUAGE.into()));
        }
        for token in ["xml", "svg"] {
            loader.register(token, builtin("xml", || tree_sitter_xml::LANGUAGE_XML.into()));
        }

        loader.register("py", builtin("python", || tree_sitter_python::LANGUAGE.into()));
        loader.register("php", builtin("php", || tree_sitter_php::LANGUAGE_PHP.into()));
        loader.register("sql", builtin("sql", || tree_sitter_sequel::LANGUAGE.into()));

        // Config formats borrow the JSON grammar; close enough for coloring.
        for token in ["json", "jsonc", "toml", "yaml", "yml"] {
            loader.register(token, builtin("json", || tree_sitter_json::LANGUAGE.into()));
        }

        loader
    }

    /// Registers (or replaces) the loader for a token.
    pub fn register<F, Fut>(&mut self, token: &str, loader: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SyntaxResult<SyntaxModule>> + Send + 'static,
    {
        let loader: LoaderFn = Arc::new(move || Box::pin(loader()) as LoadFuture);
        Arc::make_mut(&mut self.loaders).insert(token.to_lowercase(), loader);
    }

    /// Returns true if a loader is registered for the token.
    pub fn has_support(&self, token: &str) -> bool {
        self.loaders.contains_key(&token.to_lowercase())
    }

    /// Returns the module if it has already been loaded.
    pub fn cached(&self, token: &str) -> Option<Arc<SyntaxModule>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&token.to_lowercase())
            .cloned()
    }

    /// Loads the module for a token.
    ///
    /// Returns `None` for unregistered tokens and for loader failures; the
    /// caller renders plain text in both cases. Failures are not cached, so
    /// a later call tries again.
    pub async fn load(&self, token: &str) -> Option<Arc<SyntaxModule>> {
        let token = token.to_lowercase();

        if let Some(module) = self.cached(&token) {
            return Some(module);
        }

        let loader = self.loaders.get(&token)?.clone();

        match loader().await {
            Ok(module) => {
                let module = Arc::new(module);
                let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
                // A concurrent load for the same token may have won the race.
                let module = cache.entry(token).or_insert(module).clone();
                Some(module)
            }
            Err(err) => {
                tracing::warn!("Failed to load syntax for .{}: {}", token, err);
                None
            }
        }
    }

    /// Returns the registered tokens, sorted.
    pub fn tokens(&self) -> Vec<&str> {
        let mut tokens: Vec<&str> = self.loaders.keys().map(String::as_str).collect();
        tokens.sort_unstable();
        tokens
    }
}

impl std::fmt::Debug for SyntaxLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntaxLoader")
            .field("tokens", &self.tokens())
            .finish_non_exhaustive()
    }
}

impl Default for SyntaxLoader {
    fn default() -> Self {
        Self::with_builtin()
    }
}

fn builtin(
    name: &'static str,
    language: fn() -> tree_sitter::Language,
) -> impl Fn() -> std::future::Ready<SyntaxResult<SyntaxModule>> + Send + Sync + 'static {
    move || std::future::ready(SyntaxModule::compile(name, language()))
}
