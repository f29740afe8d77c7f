//! FFI bindings for Metabolic Flux
//!
//! This module provides C-compatible functions for calling the engine from a host UI.
//! All functions use C strings (null-terminated), exchange JSON, and return allocated
//! memory that must be freed by the caller using `mflux_free_string`.

use chrono::Utc;
use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::Profile;
use crate::journal::BioJournal;
use crate::pipeline::{targets_from_json, TargetProcessor};
use crate::types::{DailyBioSnapshot, EventType, EventValue};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Like `cstr_to_string`, recording an error naming the argument on failure
unsafe fn required_arg(ptr: *const c_char, name: &str) -> Option<String> {
    let value = cstr_to_string(ptr);
    if value.is_none() {
        set_last_error(&format!("Invalid {name} string pointer"));
    }
    value
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Serialize a result list to a C string, or NULL with the error recorded
fn to_json_cstr<T: serde::Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
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

/// Compute today's adaptive targets.
///
/// # Safety
/// - `snapshot_json` and `profile_json` must be valid null-terminated C strings.
/// - Returns a newly allocated `AdaptiveTargets` JSON string that must be freed with
///   `mflux_free_string`.
/// - Returns NULL on error; call `mflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn mflux_compute_targets(
    snapshot_json: *const c_char,
    profile_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(snapshot) = required_arg(snapshot_json, "snapshot JSON") else {
        return ptr::null_mut();
    };
    let Some(profile) = required_arg(profile_json, "profile JSON") else {
        return ptr::null_mut();
    };

    match targets_from_json(&snapshot, &profile, Utc::now()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a TargetProcessor
pub struct TargetProcessorHandle {
    processor: TargetProcessor,
}

/// Create a new memoizing target processor.
///
/// # Safety
/// - Returns a pointer to a newly allocated processor.
/// - Must be freed with `mflux_processor_free`.
#[no_mangle]
pub unsafe extern "C" fn mflux_processor_new() -> *mut TargetProcessorHandle {
    clear_last_error();

    let handle = Box::new(TargetProcessorHandle {
        processor: TargetProcessor::new(),
    });
    Box::into_raw(handle)
}

/// Free a target processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `mflux_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn mflux_processor_free(processor: *mut TargetProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Targets for `version_key`; recomputed only when the key changed since the last call.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `mflux_processor_new`.
/// - `version_key`, `snapshot_json` and `profile_json` must be valid null-terminated
///   C strings.
/// - Returns a newly allocated string that must be freed with `mflux_free_string`.
/// - Returns NULL on error; call `mflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn mflux_processor_targets(
    processor: *mut TargetProcessorHandle,
    version_key: *const c_char,
    snapshot_json: *const c_char,
    profile_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let Some(version_key) = required_arg(version_key, "version key") else {
        return ptr::null_mut();
    };
    let Some(snapshot_json) = required_arg(snapshot_json, "snapshot JSON") else {
        return ptr::null_mut();
    };
    let Some(profile_json) = required_arg(profile_json, "profile JSON") else {
        return ptr::null_mut();
    };

    let snapshot: DailyBioSnapshot = match serde_json::from_str(&snapshot_json) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            set_last_error(&format!("Parse error: snapshot: {e}"));
            return ptr::null_mut();
        }
    };
    let profile = match Profile::from_json(&profile_json) {
        Ok(profile) => profile,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let targets = handle
        .processor
        .targets(&version_key, &snapshot, &profile, Utc::now());
    to_json_cstr(&targets)
}

// ============================================================================
// Journal API
// ============================================================================

/// Opaque handle to a BioJournal
pub struct JournalHandle {
    journal: BioJournal,
}

/// Open the journal stored at `path` (`:memory:` for a throwaway one).
///
/// The database is opened on first use. If that fails, the journal keeps working
/// in no-op mode: writes return 0 and reads return empty arrays.
///
/// # Safety
/// - `path` must be a valid null-terminated C string.
/// - Must be freed with `mflux_journal_free`.
/// - Returns NULL on error; call `mflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn mflux_journal_open(path: *const c_char) -> *mut JournalHandle {
    clear_last_error();

    let Some(path) = required_arg(path, "path") else {
        return ptr::null_mut();
    };

    let handle = Box::new(JournalHandle {
        journal: BioJournal::open(path),
    });
    Box::into_raw(handle)
}

/// Free a journal.
///
/// # Safety
/// - `journal` must be a valid pointer returned by `mflux_journal_open`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn mflux_journal_free(journal: *mut JournalHandle) {
    if !journal.is_null() {
        drop(Box::from_raw(journal));
    }
}

/// Log an event now.
///
/// `event_type` is one of FOOD, WORKOUT, WEATHER, SLEEP. `value_json` may be the
/// tagged form (`{"kind":"text","value":"red"}`), any other JSON, or plain text.
///
/// # Safety
/// - `journal` must be a valid pointer returned by `mflux_journal_open`.
/// - `event_type` and `name` must be valid null-terminated C strings; `value_json`
///   may be NULL for an empty payload.
/// - Returns the event id, 0 if it was not recorded, or -1 on invalid arguments.
#[no_mangle]
pub unsafe extern "C" fn mflux_journal_log_event(
    journal: *const JournalHandle,
    event_type: *const c_char,
    name: *const c_char,
    value_json: *const c_char,
) -> i64 {
    clear_last_error();

    if journal.is_null() {
        set_last_error("Null journal pointer");
        return -1;
    }

    let handle = &*journal;

    let Some(event_type) = required_arg(event_type, "event type") else {
        return -1;
    };
    let Some(event_type) = EventType::parse(&event_type) else {
        set_last_error(&format!("Unknown event type: {event_type}"));
        return -1;
    };
    let Some(name) = required_arg(name, "name") else {
        return -1;
    };
    let value = cstr_to_string(value_json)
        .map(|raw| EventValue::from_input(&raw))
        .unwrap_or_else(|| EventValue::Text(String::new()));

    handle.journal.log_event(event_type, &name, value)
}

/// Log a symptom now; intensity is clamped to 1-10.
///
/// # Safety
/// - `journal` must be a valid pointer returned by `mflux_journal_open`.
/// - `name` must be a valid null-terminated C string.
/// - Returns the episode id, 0 if it was not recorded, or -1 on invalid arguments.
#[no_mangle]
pub unsafe extern "C" fn mflux_journal_log_symptom(
    journal: *const JournalHandle,
    name: *const c_char,
    intensity: i32,
) -> i64 {
    clear_last_error();

    if journal.is_null() {
        set_last_error("Null journal pointer");
        return -1;
    }

    let handle = &*journal;

    let Some(name) = required_arg(name, "name") else {
        return -1;
    };

    handle.journal.log_symptom(&name, i64::from(intensity))
}

/// Correlations for one symptom as a JSON array.
///
/// # Safety
/// - `journal` must be a valid pointer returned by `mflux_journal_open`.
/// - `symptom` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `mflux_free_string`.
/// - Returns NULL on error; call `mflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn mflux_journal_correlations(
    journal: *const JournalHandle,
    symptom: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if journal.is_null() {
        set_last_error("Null journal pointer");
        return ptr::null_mut();
    }

    let handle = &*journal;

    let Some(symptom) = required_arg(symptom, "symptom") else {
        return ptr::null_mut();
    };

    to_json_cstr(&handle.journal.find_correlations(&symptom))
}

/// Monthly patterns as a JSON array.
///
/// # Safety
/// - `journal` must be a valid pointer returned by `mflux_journal_open`.
/// - Returns a newly allocated string that must be freed with `mflux_free_string`.
/// - Returns NULL on error; call `mflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn mflux_journal_monthly_patterns(
    journal: *const JournalHandle,
    year: i32,
    month: u32,
) -> *mut c_char {
    clear_last_error();

    if journal.is_null() {
        set_last_error("Null journal pointer");
        return ptr::null_mut();
    }

    let handle = &*journal;
    to_json_cstr(&handle.journal.monthly_patterns(year, month))
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by engine functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an engine function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn mflux_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next engine call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn mflux_last_error() -> *const c_char {
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
pub unsafe extern "C" fn mflux_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_snapshot_json() -> CString {
        CString::new(
            r#"{
                "date": "2024-03-10",
                "sleep_hours": 8.0,
                "steps": 4000,
                "active_energy_kcal": 0.0,
                "today_carbs_grams": 60.0,
                "ambient_temp_c": 20.0
            }"#,
        )
        .unwrap()
    }

    fn sample_profile_json() -> CString {
        CString::new(r#"{"body_weight_kg": 70.0, "base_carbs_g": 25.0, "base_protein_g": 100.0}"#)
            .unwrap()
    }

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let value = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        mflux_free_string(ptr);
        value
    }

    #[test]
    fn test_ffi_compute_targets() {
        let snapshot = sample_snapshot_json();
        let profile = sample_profile_json();

        unsafe {
            let result = mflux_compute_targets(snapshot.as_ptr(), profile.as_ptr());
            let json: serde_json::Value = serde_json::from_str(&take_string(result)).unwrap();

            assert_eq!(json["dynamic_carb_limit_grams"], 25);
            assert_eq!(json["dynamic_protein_target_grams"], 100);
            assert_eq!(json["readiness_score"], 100.0);
            assert_eq!(json["estimated_ketone_mmol_l"], 0.1);
        }
    }

    #[test]
    fn test_ffi_processor_lifecycle() {
        let key = CString::new("2024-03-10#1").unwrap();
        let snapshot = sample_snapshot_json();
        let profile = sample_profile_json();

        unsafe {
            let processor = mflux_processor_new();
            assert!(!processor.is_null());

            let first = take_string(mflux_processor_targets(
                processor,
                key.as_ptr(),
                snapshot.as_ptr(),
                profile.as_ptr(),
            ));
            let second = take_string(mflux_processor_targets(
                processor,
                key.as_ptr(),
                snapshot.as_ptr(),
                profile.as_ptr(),
            ));
            assert_eq!(first, second);

            mflux_processor_free(processor);
        }
    }

    #[test]
    fn test_ffi_journal_lifecycle() {
        let path = CString::new(":memory:").unwrap();
        let food = CString::new("food").unwrap();
        let wine = CString::new("Wine").unwrap();
        let value = CString::new("red").unwrap();
        let headache = CString::new("Headache").unwrap();

        unsafe {
            let journal = mflux_journal_open(path.as_ptr());
            assert!(!journal.is_null());

            let id = mflux_journal_log_event(journal, food.as_ptr(), wine.as_ptr(), value.as_ptr());
            assert!(id > 0);
            assert!(mflux_journal_log_symptom(journal, headache.as_ptr(), 7) > 0);

            let correlations = take_string(mflux_journal_correlations(journal, headache.as_ptr()));
            let parsed: serde_json::Value = serde_json::from_str(&correlations).unwrap();
            assert_eq!(parsed[0]["event_name"], "Wine");
            assert_eq!(parsed[0]["percentage_of_episodes"], 100);

            let patterns = take_string(mflux_journal_monthly_patterns(journal, 2024, 5));
            assert_eq!(patterns, "[]");

            mflux_journal_free(journal);
        }
    }

    #[test]
    fn test_ffi_unopenable_journal_returns_zero() {
        let path = CString::new("/nonexistent-metabolic-flux-dir/nested/journal.db").unwrap();
        let name = CString::new("Nausea").unwrap();

        unsafe {
            let journal = mflux_journal_open(path.as_ptr());
            assert!(!journal.is_null());
            assert_eq!(mflux_journal_log_symptom(journal, name.as_ptr(), 5), 0);
            assert_eq!(
                take_string(mflux_journal_correlations(journal, name.as_ptr())),
                "[]"
            );
            mflux_journal_free(journal);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        let invalid = CString::new("not json").unwrap();
        let profile = sample_profile_json();
        let bogus_type = CString::new("DRINK").unwrap();
        let name = CString::new("Soda").unwrap();

        unsafe {
            let result = mflux_compute_targets(invalid.as_ptr(), profile.as_ptr());
            assert!(result.is_null());

            let error = mflux_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(error_str.contains("snapshot"));

            assert!(mflux_compute_targets(ptr::null(), profile.as_ptr()).is_null());

            let journal = mflux_journal_open(CString::new(":memory:").unwrap().as_ptr());
            let id = mflux_journal_log_event(journal, bogus_type.as_ptr(), name.as_ptr(), ptr::null());
            assert_eq!(id, -1);
            mflux_journal_free(journal);

            assert_eq!(
                mflux_journal_log_symptom(ptr::null(), name.as_ptr(), 3),
                -1
            );
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = mflux_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
