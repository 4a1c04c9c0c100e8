//! FFI bindings for Synheart Cognition
//!
//! C-compatible functions for calling the engine from other languages.
//! Inputs and outputs are null-terminated JSON strings; every returned string
//! is allocated here and must be freed with `cognition_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::EngineConfig;
use crate::error::ComputeError;
use crate::pipeline::{compute_metrics_json, CognitionEngine, SubmissionDocument};

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Turn a computation result into a returned string or NULL + last error.
fn finish(result: Result<String, ComputeError>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Process a submission document with the default configuration.
///
/// # Safety
/// - `document_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `cognition_free_string`.
/// - Returns NULL on error; call `cognition_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn cognition_process_json(document_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json = match cstr_to_string(document_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid document string pointer");
            return ptr::null_mut();
        }
    };

    finish(compute_metrics_json(&json))
}

// ============================================================================
// Configured engine API
// ============================================================================

/// Opaque handle to a configured engine.
pub struct CognitionEngineHandle {
    engine: CognitionEngine,
}

/// Create an engine from a JSON configuration.
///
/// # Safety
/// - `config_json` may be NULL for the default configuration, otherwise a
///   valid null-terminated C string.
/// - Must be freed with `cognition_engine_free`.
/// - Returns NULL if the configuration is invalid.
#[no_mangle]
pub unsafe extern "C" fn cognition_engine_new(
    config_json: *const c_char,
) -> *mut CognitionEngineHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        Ok(EngineConfig::default())
    } else {
        match cstr_to_string(config_json) {
            Some(json) => EngineConfig::from_json(&json),
            None => Err(ComputeError::InvalidConfig(
                "config is not valid UTF-8".to_string(),
            )),
        }
    };

    match config.and_then(CognitionEngine::new) {
        Ok(engine) => Box::into_raw(Box::new(CognitionEngineHandle { engine })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `cognition_engine_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn cognition_engine_free(engine: *mut CognitionEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Process a submission document with a configured engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `cognition_engine_new`.
/// - `document_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `cognition_free_string`.
/// - Returns NULL on error; call `cognition_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn cognition_engine_process(
    engine: *const CognitionEngineHandle,
    document_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &*engine;

    let json = match cstr_to_string(document_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid document string pointer");
            return ptr::null_mut();
        }
    };

    finish(
        SubmissionDocument::from_json(&json)
            .and_then(|document| handle.engine.process_document(&document))
            .and_then(|report| report.to_json()),
    )
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by this library.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a `cognition_*` function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn cognition_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next `cognition_*` call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn cognition_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn cognition_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
