//! FFI bindings for Mindful Pulse
//!
//! This module provides C-compatible functions for calling Pulse from other languages.
//! All functions use C strings (null-terminated) and return allocated memory that
//! must be freed by the caller using `pulse_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::{DateTime, Utc};

use crate::error::PulseError;
use crate::pipeline::{facial_score_json, recommend_json, stats_json, StressProcessor};
use crate::types::{StressChannel, StressSample};

// Thread-local storage for the last error message
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

fn report(err: &PulseError) {
    set_last_error(&format!("{}: {}", err.code(), err));
}

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Convert a Rust string to a C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn string_result(result: Result<String, PulseError>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            report(&e);
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Recommend activities for a JSON stress indicators object.
///
/// # Safety
/// - `indicators_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_recommend(indicators_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let Some(json) = cstr_to_string(indicators_json) else {
        set_last_error("Invalid indicators string pointer");
        return ptr::null_mut();
    };

    string_result(recommend_json(&json))
}

/// Compute statistics for a JSON array of sessions since an RFC 3339 instant.
///
/// # Safety
/// - `sessions_json` and `window_start` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_stats(
    sessions_json: *const c_char,
    window_start: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(json) = cstr_to_string(sessions_json) else {
        set_last_error("Invalid sessions string pointer");
        return ptr::null_mut();
    };

    let Some(start) = cstr_to_string(window_start) else {
        set_last_error("Invalid window_start string pointer");
        return ptr::null_mut();
    };

    let start = match DateTime::parse_from_rfc3339(&start) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(e) => {
            report(&PulseError::ParseError(format!("window_start: {e}")));
            return ptr::null_mut();
        }
    };

    string_result(stats_json(&json, start))
}

/// Score a JSON emotion → probability map.
///
/// # Safety
/// - `expressions_json` must be a valid null-terminated C string.
/// - Returns the score in [0, 100], or -1.0 on error; call `pulse_last_error`
///   to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_facial_score(expressions_json: *const c_char) -> f64 {
    clear_last_error();

    let Some(json) = cstr_to_string(expressions_json) else {
        set_last_error("Invalid expressions string pointer");
        return -1.0;
    };

    match facial_score_json(&json) {
        Ok(score) => score,
        Err(e) => {
            report(&e);
            -1.0
        }
    }
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a StressProcessor
pub struct PulseProcessorHandle {
    processor: StressProcessor,
}

/// Create a new StressProcessor with default settings.
///
/// # Safety
/// - Returns a pointer to a newly allocated processor.
/// - Must be freed with `pulse_processor_free`.
#[no_mangle]
pub unsafe extern "C" fn pulse_processor_new() -> *mut PulseProcessorHandle {
    clear_last_error();
    Box::into_raw(Box::new(PulseProcessorHandle {
        processor: StressProcessor::new(),
    }))
}

/// Free a StressProcessor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `pulse_processor_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pulse_processor_free(processor: *mut PulseProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Feed one channel score and return the resulting stress report as JSON.
///
/// `channel` is one of `facial`, `typing` or `voice`. `timestamp_ms` is
/// milliseconds since the Unix epoch.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `pulse_processor_new`.
/// - `channel` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_processor_ingest(
    processor: *mut PulseProcessorHandle,
    channel: *const c_char,
    value: f64,
    timestamp_ms: i64,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let Some(channel) = cstr_to_string(channel) else {
        set_last_error("Invalid channel string pointer");
        return ptr::null_mut();
    };

    let channel = match channel.parse::<StressChannel>() {
        Ok(c) => c,
        Err(e) => {
            report(&e);
            return ptr::null_mut();
        }
    };

    let Some(at) = DateTime::<Utc>::from_timestamp_millis(timestamp_ms) else {
        report(&PulseError::ParseError(format!(
            "timestamp out of range: {timestamp_ms}"
        )));
        return ptr::null_mut();
    };

    let stress_report = handle
        .processor
        .ingest(&StressSample::new(channel, value, at));
    string_result(serde_json::to_string(&stress_report).map_err(PulseError::from))
}

/// Set or clear (`NaN`) the external sentiment in [0, 1].
///
/// # Safety
/// - `processor` must be a valid pointer returned by `pulse_processor_new`.
/// - Returns 0 on success, -1 on a null processor.
#[no_mangle]
pub unsafe extern "C" fn pulse_processor_set_sentiment(
    processor: *mut PulseProcessorHandle,
    sentiment: f64,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;
    handle
        .processor
        .set_sentiment((!sentiment.is_nan()).then_some(sentiment));
    0
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Pulse functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Pulse function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pulse_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Pulse function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn pulse_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Pulse library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn pulse_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        pulse_free_string(ptr);
        s
    }

    #[test]
    fn test_ffi_recommend() {
        let json = CString::new(r#"{"facial_stress": 75, "typing_stress": 75}"#).unwrap();
        unsafe {
            let result = take_string(pulse_recommend(json.as_ptr()));
            assert!(result.contains("Deep Breathing"));
            assert!(result.contains("\"meanStress\":75"));
        }
    }

    #[test]
    fn test_ffi_stats() {
        let sessions = CString::new(
            r#"[{"id":"1","userId":"u","type":"guided","durationMinutes":10,"completed":true,"timestamp":"2024-01-15T09:00:00Z"}]"#,
        )
        .unwrap();
        let start = CString::new("2024-01-08T00:00:00Z").unwrap();
        unsafe {
            let result = take_string(pulse_stats(sessions.as_ptr(), start.as_ptr()));
            assert!(result.contains("\"totalSessions\":1"));
            assert!(result.contains("\"streak\":1"));
        }
    }

    #[test]
    fn test_ffi_facial_score() {
        let json = CString::new(r#"{"angry": 1.0}"#).unwrap();
        unsafe {
            assert_eq!(pulse_facial_score(json.as_ptr()), 100.0);
        }
    }

    #[test]
    fn test_ffi_processor_lifecycle() {
        let channel = CString::new("facial").unwrap();
        unsafe {
            let processor = pulse_processor_new();
            assert!(!processor.is_null());

            assert_eq!(pulse_processor_set_sentiment(processor, 0.1), 0);
            let report = take_string(pulse_processor_ingest(
                processor,
                channel.as_ptr(),
                100.0,
                1_705_327_200_000,
            ));
            assert!(report.contains("\"overall\":40"));

            pulse_processor_free(processor);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        let invalid = CString::new("not json").unwrap();
        let bad_channel = CString::new("smell").unwrap();
        unsafe {
            assert!(pulse_recommend(invalid.as_ptr()).is_null());
            let error = CStr::from_ptr(pulse_last_error()).to_str().unwrap();
            assert!(error.starts_with("JSON_ERROR"));

            assert_eq!(pulse_facial_score(ptr::null()), -1.0);
            assert!(!pulse_last_error().is_null());

            let processor = pulse_processor_new();
            assert!(pulse_processor_ingest(processor, bad_channel.as_ptr(), 1.0, 0).is_null());
            let error = CStr::from_ptr(pulse_last_error()).to_str().unwrap();
            assert!(error.starts_with("PARSE_ERROR"));
            pulse_processor_free(processor);

            assert!(pulse_stats(invalid.as_ptr(), invalid.as_ptr()).is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = CStr::from_ptr(pulse_version()).to_str().unwrap();
            assert_eq!(version, env!("CARGO_PKG_VERSION"));
        }
    }
}
