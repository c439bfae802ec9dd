//! Emit configuration.

/// How export names become method names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportNaming {
    /// Keep the export name, replacing characters that are not valid in
    /// identifiers.
    #[default]
    Preserve,
    /// Convert `foo_bar` / `foo-bar` to `fooBar`.
    CamelCase,
}

/// Visibility of generated export wrappers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Visibility {
    /// `pub`
    #[default]
    Public,
    /// `pub(crate)`
    Crate,
}

impl Visibility {
    /// Rust visibility keyword.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Public => "pub",
            Self::Crate => "pub(crate)",
        }
    }
}

/// Backing storage of the generated linear memory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MemoryBackend {
    /// Heap buffer (`Vec<u8>`) resized on growth.
    #[default]
    Buffer,
    /// Anonymous mapping reserving the maximum size up front; pages are
    /// made accessible as the memory grows.
    Mapped,
}

/// Code generation configuration.
///
/// Passed by reference to every generator; never mutated during generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmitConfig {
    /// Target module name, used in artifact headers.
    pub package: String,
    /// Annotate generated statements with the source instruction.
    pub expr_comments: bool,
    /// Export method naming.
    pub export_naming: ExportNaming,
    /// Export method visibility.
    pub export_visibility: Visibility,
    /// Memory backend.
    pub memory_backend: MemoryBackend,
    /// Use unchecked memory accesses and indirect calls.
    pub unsafe_access: bool,
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self {
            package: "gen".to_string(),
            expr_comments: false,
            export_naming: ExportNaming::Preserve,
            export_visibility: Visibility::Public,
            memory_backend: MemoryBackend::Buffer,
            unsafe_access: false,
        }
    }
}

impl EmitConfig {
    /// Create config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target package name.
    #[must_use]
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    /// Enable or disable per-instruction comments.
    #[must_use]
    pub const fn with_expr_comments(mut self, enabled: bool) -> Self {
        self.expr_comments = enabled;
        self
    }

    /// Set export naming.
    #[must_use]
    pub const fn with_export_naming(mut self, naming: ExportNaming) -> Self {
        self.export_naming = naming;
        self
    }

    /// Set export visibility.
    #[must_use]
    pub const fn with_export_visibility(mut self, visibility: Visibility) -> Self {
        self.export_visibility = visibility;
        self
    }

    /// Set the memory backend.
    #[must_use]
    pub const fn with_memory_backend(mut self, backend: MemoryBackend) -> Self {
        self.memory_backend = backend;
        self
    }

    /// Enable or disable unchecked accesses.
    #[must_use]
    pub const fn with_unsafe_access(mut self, enabled: bool) -> Self {
        self.unsafe_access = enabled;
        self
    }
}
