//! Engine backend resolved from a shared library at runtime.
//!
//! Every entry point is looked up once when the library is loaded; a missing
//! symbol is a [`StreamError::BackendLoad`] before any session state exists.
//! Engine instances hold an `Arc` to the loaded library, so the library is
//! unloaded only after the last instance has been deleted.

use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};
use std::sync::Arc;

use libloading::Library;
use tracing::{debug, info};

use crate::engine::{check_frame, EngineBackend, EngineInitParams, Enhancer};
use crate::error::{EngineError, EngineStatus, StreamError};

type StatusToStringFn = unsafe extern "C" fn(c_int) -> *const c_char;
type SampleRateFn = unsafe extern "C" fn() -> i32;
type InitFn =
    unsafe extern "C" fn(*const c_char, *const c_char, *const c_char, *mut *mut c_void) -> c_int;
type DeleteFn = unsafe extern "C" fn(*mut c_void);
type ProcessFn = unsafe extern "C" fn(*mut c_void, *const i16, *mut i16) -> c_int;
type ResetFn = unsafe extern "C" fn(*mut c_void) -> c_int;
type DelaySampleFn = unsafe extern "C" fn(*const c_void, *mut i32) -> c_int;
type FrameLengthFn = unsafe extern "C" fn() -> i32;
type VersionFn = unsafe extern "C" fn() -> *const c_char;
type GetErrorStackFn = unsafe extern "C" fn(*mut *mut *mut c_char, *mut i32) -> c_int;
type FreeErrorStackFn = unsafe extern "C" fn(*mut *mut c_char);
type ListHardwareDevicesFn = unsafe extern "C" fn(*mut *mut *mut c_char, *mut i32) -> c_int;
type FreeHardwareDevicesFn = unsafe extern "C" fn(*mut *mut c_char, i32) -> c_int;

/// Resolved function table. Only valid while `_lib` is loaded.
struct EngineLibrary {
    status_to_string: StatusToStringFn,
    sample_rate: SampleRateFn,
    init: InitFn,
    delete: DeleteFn,
    process: ProcessFn,
    reset: ResetFn,
    delay_sample: DelaySampleFn,
    frame_length: FrameLengthFn,
    version: VersionFn,
    get_error_stack: GetErrorStackFn,
    free_error_stack: FreeErrorStackFn,
    list_hardware_devices: ListHardwareDevicesFn,
    free_hardware_devices: FreeHardwareDevicesFn,
    path: PathBuf,
    _lib: Library,
}

fn load_symbol<T: Copy>(lib: &Library, path: &Path, name: &str) -> Result<T, StreamError> {
    // SAFETY: The caller names the symbol with the signature declared by the
    // engine header; the pointer stays valid while `lib` is loaded.
    unsafe {
        lib.get::<T>(name.as_bytes())
            .map(|symbol| *symbol)
            .map_err(|err| StreamError::BackendLoad {
                path: path.to_path_buf(),
                reason: format!("failed to load '{}': {}", name, err),
            })
    }
}

impl EngineLibrary {
    fn open(path: &Path) -> Result<Self, StreamError> {
        // SAFETY: Loading a foreign library runs its initialisers; the engine
        // library is trusted by contract.
        let lib = unsafe { Library::new(path) }.map_err(|err| StreamError::BackendLoad {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;

        Ok(Self {
            status_to_string: load_symbol(&lib, path, "pv_status_to_string")?,
            sample_rate: load_symbol(&lib, path, "pv_sample_rate")?,
            init: load_symbol(&lib, path, "pv_koala_init")?,
            delete: load_symbol(&lib, path, "pv_koala_delete")?,
            process: load_symbol(&lib, path, "pv_koala_process")?,
            reset: load_symbol(&lib, path, "pv_koala_reset")?,
            delay_sample: load_symbol(&lib, path, "pv_koala_delay_sample")?,
            frame_length: load_symbol(&lib, path, "pv_koala_frame_length")?,
            version: load_symbol(&lib, path, "pv_koala_version")?,
            get_error_stack: load_symbol(&lib, path, "pv_get_error_stack")?,
            free_error_stack: load_symbol(&lib, path, "pv_free_error_stack")?,
            list_hardware_devices: load_symbol(&lib, path, "pv_koala_list_hardware_devices")?,
            free_hardware_devices: load_symbol(&lib, path, "pv_koala_free_hardware_devices")?,
            path: path.to_path_buf(),
            _lib: lib,
        })
    }

    fn status_name(&self, status: c_int) -> String {
        // SAFETY: Returns a static string owned by the library.
        let name = unsafe { (self.status_to_string)(status) };
        if name.is_null() {
            return EngineStatus::from_raw(status).to_string();
        }
        // SAFETY: Non-null, NUL-terminated per the engine contract.
        unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned()
    }

    /// Drains the engine's diagnostic stack, releasing it before returning.
    fn take_error_stack(&self) -> Vec<String> {
        let mut stack: *mut *mut c_char = ptr::null_mut();
        let mut depth: i32 = 0;
        // SAFETY: Out-pointers are valid for writes.
        let status = unsafe { (self.get_error_stack)(&mut stack, &mut depth) };
        if status != 0 {
            return vec![format!(
                "Unable to get engine error state with '{}'",
                self.status_name(status)
            )];
        }

        // SAFETY: On success `stack` holds `depth` NUL-terminated strings.
        let messages = unsafe { collect_strings(stack, depth) };
        if !stack.is_null() {
            // SAFETY: Allocated by `get_error_stack`, freed exactly once.
            unsafe { (self.free_error_stack)(stack) };
        }
        messages
    }

    fn failure(&self, operation: &'static str, status: c_int) -> EngineError {
        let diagnostics = self.take_error_stack();
        let status = EngineStatus::from_raw(status);
        debug!(
            "engine '{}' failed with {} ({} diagnostics)",
            operation,
            self.status_name(status.raw()),
            diagnostics.len()
        );
        EngineError::new(operation, status, diagnostics)
    }
}

unsafe fn collect_strings(list: *mut *mut c_char, count: i32) -> Vec<String> {
    if list.is_null() || count <= 0 {
        return Vec::new();
    }
    (0..count as usize)
        .map(|index| {
            let entry = *list.add(index);
            if entry.is_null() {
                String::new()
            } else {
                CStr::from_ptr(entry).to_string_lossy().into_owned()
            }
        })
        .collect()
}

fn c_string(operation: &'static str, value: &str) -> Result<CString, EngineError> {
    CString::new(value)
        .map_err(|_| EngineError::invalid_argument(operation, "argument contains a NUL byte"))
}

/// Engine backend backed by a shared library on disk.
#[derive(Clone)]
pub struct DynamicBackend {
    library: Arc<EngineLibrary>,
}

impl DynamicBackend {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StreamError> {
        let library = EngineLibrary::open(path.as_ref())?;
        info!("loaded engine library from {}", library.path.display());
        Ok(Self {
            library: Arc::new(library),
        })
    }

    pub fn path(&self) -> &Path {
        &self.library.path
    }
}

impl EngineBackend for DynamicBackend {
    fn frame_length(&self) -> usize {
        // SAFETY: Pure getter.
        let length = unsafe { (self.library.frame_length)() };
        length.max(0) as usize
    }

    fn sample_rate(&self) -> u32 {
        // SAFETY: Pure getter.
        let rate = unsafe { (self.library.sample_rate)() };
        rate.max(0) as u32
    }

    fn version(&self) -> String {
        // SAFETY: Returns a static string owned by the library.
        let version = unsafe { (self.library.version)() };
        if version.is_null() {
            return String::new();
        }
        // SAFETY: Non-null, NUL-terminated.
        unsafe { CStr::from_ptr(version) }
            .to_string_lossy()
            .into_owned()
    }

    fn list_hardware_devices(&self) -> Result<Vec<String>, EngineError> {
        let mut devices: *mut *mut c_char = ptr::null_mut();
        let mut count: i32 = 0;
        // SAFETY: Out-pointers are valid for writes.
        let status = unsafe { (self.library.list_hardware_devices)(&mut devices, &mut count) };
        if status != 0 {
            return Err(self.library.failure("list_hardware_devices", status));
        }

        // SAFETY: On success the list holds `count` strings.
        let names = unsafe { collect_strings(devices, count) };
        if !devices.is_null() {
            // SAFETY: Allocated by `list_hardware_devices`, released once here.
            unsafe { (self.library.free_hardware_devices)(devices, count) };
        }
        Ok(names)
    }

    fn init(&self, params: &EngineInitParams) -> Result<Box<dyn Enhancer>, EngineError> {
        let access_key = c_string("init", &params.access_key)?;
        let model_path = params
            .model_path
            .as_ref()
            .map(|path| c_string("init", &path.to_string_lossy()))
            .transpose()?;
        let device = c_string("init", &params.device)?;

        let mut handle: *mut c_void = ptr::null_mut();
        // SAFETY: All strings outlive the call; `handle` is a valid out-pointer.
        let status = unsafe {
            (self.library.init)(
                access_key.as_ptr(),
                model_path.as_ref().map_or(ptr::null(), |path| path.as_ptr()),
                device.as_ptr(),
                &mut handle,
            )
        };
        if status != 0 {
            return Err(self.library.failure("init", status));
        }
        let handle = NonNull::new(handle).ok_or_else(|| {
            EngineError::new(
                "init",
                EngineStatus::RuntimeError,
                vec!["engine returned a null handle".to_string()],
            )
        })?;

        Ok(Box::new(DynamicEnhancer {
            handle,
            frame_length: self.frame_length(),
            sample_rate: self.sample_rate(),
            version: self.version(),
            library: Arc::clone(&self.library),
        }))
    }
}

/// Owned engine instance; deleted on drop, before its library reference is
/// released.
struct DynamicEnhancer {
    handle: NonNull<c_void>,
    frame_length: usize,
    sample_rate: u32,
    version: String,
    library: Arc<EngineLibrary>,
}

impl Enhancer for DynamicEnhancer {
    fn frame_length(&self) -> usize {
        self.frame_length
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn version(&self) -> String {
        self.version.clone()
    }

    fn delay_samples(&self) -> Result<usize, EngineError> {
        let mut delay: i32 = 0;
        // SAFETY: Handle is live; out-pointer valid.
        let status = unsafe { (self.library.delay_sample)(self.handle.as_ptr(), &mut delay) };
        if status != 0 {
            return Err(self.library.failure("delay_sample", status));
        }
        Ok(delay.max(0) as usize)
    }

    fn process(&mut self, pcm: &[i16], enhanced: &mut [i16]) -> Result<(), EngineError> {
        check_frame("process", self.frame_length, pcm, enhanced)?;
        // SAFETY: Both buffers hold exactly `frame_length` samples.
        let status = unsafe {
            (self.library.process)(self.handle.as_ptr(), pcm.as_ptr(), enhanced.as_mut_ptr())
        };
        if status != 0 {
            return Err(self.library.failure("process", status));
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<(), EngineError> {
        // SAFETY: Handle is live.
        let status = unsafe { (self.library.reset)(self.handle.as_ptr()) };
        if status != 0 {
            return Err(self.library.failure("reset", status));
        }
        Ok(())
    }
}

impl Drop for DynamicEnhancer {
    fn drop(&mut self) {
        // SAFETY: Handle came from `init` and is deleted exactly once.
        unsafe { (self.library.delete)(self.handle.as_ptr()) };
        debug!("engine instance released");
    }
}
