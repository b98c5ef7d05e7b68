//! karukan-ffi
//!
//! Binding to the Karukan engine's C ABI (`karukan.h`). The shared library
//! is loaded at runtime with `dlopen`, so the addon builds and its tests run
//! without the engine installed; every `karukan_engine_*` symbol is resolved
//! up front into a function table.
//!
//! [`FfiBackend`] wraps one engine handle and implements
//! [`karukan_addon_core::Backend`] on top of it.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use karukan_addon_core::Backend;
use tracing::{debug, warn};

/// Library loaded when `KARUKAN_LIBRARY` is unset.
pub const DEFAULT_LIBRARY: &str = "libkarukan_im.so";

/// Environment variable overriding the library path.
pub const LIBRARY_ENV: &str = "KARUKAN_LIBRARY";

/// Opaque engine instance.
#[repr(C)]
pub struct KarukanEngine {
    _private: [u8; 0],
}

type Engine = *mut KarukanEngine;
type ConstEngine = *const KarukanEngine;

struct Symbols {
    new: unsafe extern "C" fn() -> Engine,
    init: unsafe extern "C" fn(Engine) -> c_int,
    free: unsafe extern "C" fn(Engine),
    process_key: unsafe extern "C" fn(Engine, u32, u32, c_int) -> c_int,
    reset: unsafe extern "C" fn(Engine),
    set_surrounding_text: unsafe extern "C" fn(Engine, *const c_char, u32),

    has_preedit: unsafe extern "C" fn(ConstEngine) -> c_int,
    get_preedit: unsafe extern "C" fn(ConstEngine) -> *const c_char,
    get_preedit_len: unsafe extern "C" fn(ConstEngine) -> u32,
    get_preedit_caret: unsafe extern "C" fn(ConstEngine) -> u32,

    has_commit: unsafe extern "C" fn(ConstEngine) -> c_int,
    get_commit: unsafe extern "C" fn(ConstEngine) -> *const c_char,
    get_commit_len: unsafe extern "C" fn(ConstEngine) -> u32,

    has_candidates: unsafe extern "C" fn(ConstEngine) -> c_int,
    should_hide_candidates: unsafe extern "C" fn(ConstEngine) -> c_int,
    get_candidate_count: unsafe extern "C" fn(ConstEngine) -> u32,
    get_candidate: unsafe extern "C" fn(ConstEngine, u32) -> *const c_char,
    get_candidate_annotation: unsafe extern "C" fn(ConstEngine, u32) -> *const c_char,
    get_candidate_cursor: unsafe extern "C" fn(ConstEngine) -> u32,

    has_aux: unsafe extern "C" fn(ConstEngine) -> c_int,
    get_aux: unsafe extern "C" fn(ConstEngine) -> *const c_char,
    get_aux_len: unsafe extern "C" fn(ConstEngine) -> u32,

    get_last_conversion_ms: unsafe extern "C" fn(ConstEngine) -> u64,
    get_last_process_key_ms: unsafe extern "C" fn(ConstEngine) -> u64,

    save_learning: unsafe extern "C" fn(Engine),
    is_empty: unsafe extern "C" fn(ConstEngine) -> c_int,
    commit: unsafe extern "C" fn(Engine) -> c_int,
}

/// Resolve `$name` in `$handle` as the function pointer type expected at
/// the use site.
macro_rules! symbol {
    ($handle:expr, $name:literal) => {{
        let ptr = libc::dlsym($handle, concat!($name, "\0").as_ptr() as *const c_char);
        if ptr.is_null() {
            bail!("missing symbol {}: {}", $name, dl_error());
        }
        std::mem::transmute::<*mut c_void, _>(ptr)
    }};
}

impl Symbols {
    /// # Safety
    /// `handle` must be a live `dlopen` handle of a library exporting the
    /// Karukan ABI with the signatures declared above.
    unsafe fn resolve(handle: *mut c_void) -> Result<Self> {
        Ok(Self {
            new: symbol!(handle, "karukan_engine_new"),
            init: symbol!(handle, "karukan_engine_init"),
            free: symbol!(handle, "karukan_engine_free"),
            process_key: symbol!(handle, "karukan_engine_process_key"),
            reset: symbol!(handle, "karukan_engine_reset"),
            set_surrounding_text: symbol!(handle, "karukan_engine_set_surrounding_text"),
            has_preedit: symbol!(handle, "karukan_engine_has_preedit"),
            get_preedit: symbol!(handle, "karukan_engine_get_preedit"),
            get_preedit_len: symbol!(handle, "karukan_engine_get_preedit_len"),
            get_preedit_caret: symbol!(handle, "karukan_engine_get_preedit_caret"),
            has_commit: symbol!(handle, "karukan_engine_has_commit"),
            get_commit: symbol!(handle, "karukan_engine_get_commit"),
            get_commit_len: symbol!(handle, "karukan_engine_get_commit_len"),
            has_candidates: symbol!(handle, "karukan_engine_has_candidates"),
            should_hide_candidates: symbol!(handle, "karukan_engine_should_hide_candidates"),
            get_candidate_count: symbol!(handle, "karukan_engine_get_candidate_count"),
            get_candidate: symbol!(handle, "karukan_engine_get_candidate"),
            get_candidate_annotation: symbol!(handle, "karukan_engine_get_candidate_annotation"),
            get_candidate_cursor: symbol!(handle, "karukan_engine_get_candidate_cursor"),
            has_aux: symbol!(handle, "karukan_engine_has_aux"),
            get_aux: symbol!(handle, "karukan_engine_get_aux"),
            get_aux_len: symbol!(handle, "karukan_engine_get_aux_len"),
            get_last_conversion_ms: symbol!(handle, "karukan_engine_get_last_conversion_ms"),
            get_last_process_key_ms: symbol!(handle, "karukan_engine_get_last_process_key_ms"),
            save_learning: symbol!(handle, "karukan_engine_save_learning"),
            is_empty: symbol!(handle, "karukan_engine_is_empty"),
            commit: symbol!(handle, "karukan_engine_commit"),
        })
    }
}

fn dl_error() -> String {
    // SAFETY: dlerror returns null or a thread-local NUL-terminated string.
    let err = unsafe { libc::dlerror() };
    if err.is_null() {
        "unknown error".to_string()
    } else {
        unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned()
    }
}

/// A loaded engine library and its resolved entry points.
pub struct KarukanLibrary {
    handle: NonNull<c_void>,
    path: PathBuf,
    symbols: Symbols,
}

// SAFETY: the handle and function table are immutable after `open`; engine
// instances created from them are not shared.
unsafe impl Send for KarukanLibrary {}
unsafe impl Sync for KarukanLibrary {}

impl KarukanLibrary {
    /// Load the library at `path` and resolve the whole ABI.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let c_path = CString::new(path.as_os_str().as_bytes())
            .with_context(|| format!("library path {} contains NUL", path.display()))?;

        // SAFETY: c_path is a valid NUL-terminated string.
        let raw = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        let Some(handle) = NonNull::new(raw) else {
            bail!("loading {}: {}", path.display(), dl_error());
        };

        // SAFETY: handle was just returned by dlopen.
        let symbols = match unsafe { Symbols::resolve(handle.as_ptr()) } {
            Ok(symbols) => symbols,
            Err(err) => {
                unsafe { libc::dlclose(handle.as_ptr()) };
                return Err(err.context(format!("resolving engine ABI in {}", path.display())));
            }
        };

        debug!(path = %path.display(), "loaded karukan engine library");
        Ok(Self {
            handle,
            path: path.to_path_buf(),
            symbols,
        })
    }

    /// Load from `$KARUKAN_LIBRARY`, or `libkarukan_im.so` on the loader path.
    pub fn open_default() -> Result<Self> {
        let path = std::env::var_os(LIBRARY_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LIBRARY));
        Self::open(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for KarukanLibrary {
    fn drop(&mut self) {
        // SAFETY: every FfiBackend holds an Arc to this library, so no engine
        // handle outlives the mapping.
        unsafe { libc::dlclose(self.handle.as_ptr()) };
    }
}

impl std::fmt::Debug for KarukanLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KarukanLibrary")
            .field("path", &self.path)
            .finish()
    }
}

/// Copy `len` bytes from an engine-owned buffer.
///
/// # Safety
/// A non-null `ptr` must be valid for reads of `len` bytes.
pub unsafe fn borrowed_string(ptr: *const c_char, len: u32) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let bytes = std::slice::from_raw_parts(ptr as *const u8, len as usize);
    Some(String::from_utf8_lossy(bytes).into_owned())
}

/// Copy a NUL-terminated engine-owned string.
///
/// # Safety
/// A non-null `ptr` must point to a NUL-terminated string.
pub unsafe fn borrowed_c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

/// One engine instance.
pub struct FfiBackend {
    lib: Arc<KarukanLibrary>,
    engine: NonNull<KarukanEngine>,
}

impl FfiBackend {
    /// Allocate an engine. `None` if the engine returned a null handle.
    pub fn new(lib: &Arc<KarukanLibrary>) -> Option<Self> {
        // SAFETY: `new` takes no arguments and returns an owned handle or null.
        let raw = unsafe { (lib.symbols.new)() };
        match NonNull::new(raw) {
            Some(engine) => Some(Self {
                lib: lib.clone(),
                engine,
            }),
            None => {
                warn!(path = %lib.path.display(), "karukan_engine_new returned null");
                None
            }
        }
    }

    fn sym(&self) -> &Symbols {
        &self.lib.symbols
    }

    fn ptr(&self) -> Engine {
        self.engine.as_ptr()
    }

    fn const_ptr(&self) -> ConstEngine {
        self.engine.as_ptr()
    }
}

// All calls below pass a handle obtained from `new` and not yet freed.
impl Backend for FfiBackend {
    fn init(&mut self) -> Result<()> {
        let code = unsafe { (self.sym().init)(self.ptr()) };
        if code != 0 {
            bail!("karukan_engine_init returned {}", code);
        }
        Ok(())
    }

    fn process_key(&mut self, keysym: u32, mask: u32, is_release: bool) -> bool {
        let release = c_int::from(is_release);
        unsafe { (self.sym().process_key)(self.ptr(), keysym, mask, release) != 0 }
    }

    fn reset(&mut self) {
        unsafe { (self.sym().reset)(self.ptr()) }
    }

    fn set_surrounding_text(&mut self, text: &str, cursor: u32) {
        // The engine reads a C string, so anything past an interior NUL is
        // invisible to it anyway.
        let visible = text.split('\0').next().unwrap_or_default();
        let Ok(c_text) = CString::new(visible) else {
            return;
        };
        unsafe { (self.sym().set_surrounding_text)(self.ptr(), c_text.as_ptr(), cursor) }
    }

    fn is_empty(&self) -> bool {
        unsafe { (self.sym().is_empty)(self.const_ptr()) != 0 }
    }

    fn commit(&mut self) -> bool {
        unsafe { (self.sym().commit)(self.ptr()) != 0 }
    }

    fn save_learning(&mut self) {
        unsafe { (self.sym().save_learning)(self.ptr()) }
    }

    fn has_preedit(&self) -> bool {
        unsafe { (self.sym().has_preedit)(self.const_ptr()) != 0 }
    }

    fn preedit(&self) -> Option<String> {
        unsafe {
            let ptr = (self.sym().get_preedit)(self.const_ptr());
            borrowed_string(ptr, self.preedit_len())
        }
    }

    fn preedit_len(&self) -> u32 {
        unsafe { (self.sym().get_preedit_len)(self.const_ptr()) }
    }

    fn preedit_caret(&self) -> u32 {
        unsafe { (self.sym().get_preedit_caret)(self.const_ptr()) }
    }

    fn has_commit(&self) -> bool {
        unsafe { (self.sym().has_commit)(self.const_ptr()) != 0 }
    }

    fn commit_text(&self) -> Option<String> {
        unsafe {
            let ptr = (self.sym().get_commit)(self.const_ptr());
            borrowed_string(ptr, self.commit_len())
        }
    }

    fn commit_len(&self) -> u32 {
        unsafe { (self.sym().get_commit_len)(self.const_ptr()) }
    }

    fn has_aux(&self) -> bool {
        unsafe { (self.sym().has_aux)(self.const_ptr()) != 0 }
    }

    fn aux(&self) -> Option<String> {
        unsafe {
            let ptr = (self.sym().get_aux)(self.const_ptr());
            borrowed_string(ptr, self.aux_len())
        }
    }

    fn aux_len(&self) -> u32 {
        unsafe { (self.sym().get_aux_len)(self.const_ptr()) }
    }

    fn has_candidates(&self) -> bool {
        unsafe { (self.sym().has_candidates)(self.const_ptr()) != 0 }
    }

    fn should_hide_candidates(&self) -> bool {
        unsafe { (self.sym().should_hide_candidates)(self.const_ptr()) != 0 }
    }

    fn candidate_count(&self) -> u32 {
        unsafe { (self.sym().get_candidate_count)(self.const_ptr()) }
    }

    fn candidate(&self, index: u32) -> Option<String> {
        unsafe { borrowed_c_str((self.sym().get_candidate)(self.const_ptr(), index)) }
    }

    fn candidate_annotation(&self, index: u32) -> Option<String> {
        unsafe {
            borrowed_c_str((self.sym().get_candidate_annotation)(
                self.const_ptr(),
                index,
            ))
        }
    }

    fn candidate_cursor(&self) -> u32 {
        unsafe { (self.sym().get_candidate_cursor)(self.const_ptr()) }
    }

    fn last_conversion_ms(&self) -> u64 {
        unsafe { (self.sym().get_last_conversion_ms)(self.const_ptr()) }
    }

    fn last_process_key_ms(&self) -> u64 {
        unsafe { (self.sym().get_last_process_key_ms)(self.const_ptr()) }
    }
}

impl Drop for FfiBackend {
    fn drop(&mut self) {
        unsafe { (self.sym().free)(self.ptr()) }
    }
}

impl std::fmt::Debug for FfiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfiBackend")
            .field("library", &self.lib.path)
            .field("engine", &self.engine)
            .finish()
    }
}

/// Backend producer for `KarukanAddonFactory`: one engine per input context.
pub fn ffi_backend_factory(lib: Arc<KarukanLibrary>) -> impl Fn() -> Option<FfiBackend> + 'static {
    move || FfiBackend::new(&lib)
}
