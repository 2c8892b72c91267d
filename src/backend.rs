//! Accelerator context for preprocessing filters.
//!
//! The context is process-wide: [`BackendContext::initialize`] succeeds at
//! most once per process and must happen before tile work starts. The
//! refinement engine never touches the context; only [`AcceleratedFilter`]
//! calls into it, and it falls back to running the wrapped filter directly
//! when no context is active.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::OnceLock;

use crate::filter::PreprocessFilter;
use crate::image::Image;
use crate::trace::{trace_event, trace_warn};
use crate::util::{SubpixelError, SubpixelResult};

static CONTEXT: OnceLock<BackendContext> = OnceLock::new();

/// Shader language preference, in order of attempted use.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ShaderLanguage {
    /// Prefer Cg, fall back to GLSL.
    #[default]
    CgGlsl,
    /// Prefer GLSL, fall back to Cg.
    GlslCg,
    /// GLSL only.
    Glsl,
    /// Cg only.
    Cg,
}

impl ShaderLanguage {
    pub fn name(self) -> &'static str {
        match self {
            ShaderLanguage::CgGlsl => "SHADER_LANGUAGE_CHOICE_CG_GLSL",
            ShaderLanguage::GlslCg => "SHADER_LANGUAGE_CHOICE_GLSL_CG",
            ShaderLanguage::Glsl => "SHADER_LANGUAGE_CHOICE_GLSL",
            ShaderLanguage::Cg => "SHADER_LANGUAGE_CHOICE_CG",
        }
    }
}

/// Settings fixed at initialization.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BackendSettings {
    pub shader_language: ShaderLanguage,
    /// Memory recycling flag handed to the accelerator at initialization.
    pub memory_recycling: bool,
    /// Route backend messages to the log.
    pub logging: bool,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            shader_language: ShaderLanguage::default(),
            memory_recycling: true,
            logging: false,
        }
    }
}

/// Process-wide accelerator context.
#[derive(Debug)]
pub struct BackendContext {
    settings: BackendSettings,
    active: AtomicBool,
    dispatches: AtomicUsize,
}

impl BackendContext {
    /// Initializes the process-wide context.
    ///
    /// Fails with [`SubpixelError::BackendAlreadyInitialized`] on every call
    /// after the first, including calls after [`BackendContext::shutdown`].
    pub fn initialize(settings: BackendSettings) -> SubpixelResult<&'static BackendContext> {
        let mut fresh = false;
        let context = CONTEXT.get_or_init(|| {
            fresh = true;
            BackendContext {
                settings,
                active: AtomicBool::new(true),
                dispatches: AtomicUsize::new(0),
            }
        });
        if !fresh {
            return Err(SubpixelError::BackendAlreadyInitialized);
        }
        trace_event!(
            "backend_initialized",
            shader_language = settings.shader_language.name(),
            memory_recycling = settings.memory_recycling
        );
        context.log("backend initialized");
        Ok(context)
    }

    /// Returns the active context, if any.
    pub fn current() -> Option<&'static BackendContext> {
        CONTEXT
            .get()
            .filter(|context| context.active.load(Ordering::Acquire))
    }

    /// Releases the process-wide context. Later filter calls run on the CPU.
    pub fn shutdown() {
        if let Some(context) = CONTEXT.get() {
            if context.active.swap(false, Ordering::AcqRel) {
                context.log("backend shut down");
            }
        }
    }

    pub fn settings(&self) -> BackendSettings {
        self.settings
    }

    /// Number of filter invocations dispatched through the context.
    pub fn dispatches(&self) -> usize {
        self.dispatches.load(Ordering::Relaxed)
    }

    /// Writes a backend message to the log when logging is enabled.
    pub fn log(&self, message: &str) {
        if self.settings.logging {
            trace_event!("gpu_log", message = message);
        }
    }

    fn dispatch<F: PreprocessFilter + ?Sized>(&self, filter: &F, image: Image<f32>) -> Image<f32> {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
        filter.apply(image)
    }
}

/// Runs a filter through the active backend context, or directly on the CPU
/// when none is initialized.
///
/// The CPU fallback is reported once per filter, not once per tile.
#[derive(Debug, Default)]
pub struct AcceleratedFilter<F> {
    inner: F,
    fallback_reported: AtomicBool,
}

impl<F: Clone> Clone for AcceleratedFilter<F> {
    fn clone(&self) -> Self {
        Self::new(self.inner.clone())
    }
}

impl<F> AcceleratedFilter<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            fallback_reported: AtomicBool::new(false),
        }
    }

    pub fn into_inner(self) -> F {
        self.inner
    }

    /// Returns true for the first CPU fallback only.
    fn first_fallback(&self) -> bool {
        !self.fallback_reported.swap(true, Ordering::Relaxed)
    }
}

impl<F: PreprocessFilter> PreprocessFilter for AcceleratedFilter<F> {
    fn apply(&self, image: Image<f32>) -> Image<f32> {
        match BackendContext::current() {
            Some(context) => context.dispatch(&self.inner, image),
            None => {
                if self.first_fallback() {
                    trace_warn!("backend_unavailable", fallback = "cpu");
                }
                self.inner.apply(image)
            }
        }
    }
}
