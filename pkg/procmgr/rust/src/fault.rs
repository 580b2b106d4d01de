// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Turn a panic inside a reload into a value the caller can report.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

/// Symbol prefixes of frames that belong to the runtime rather than to the
/// code that faulted.
const INTERNAL_FRAMES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "backtrace::",
    "tokio::",
    "test::",
    "rust_begin_unwind",
    "rust_panic",
    "__rust",
    "__libc_start",
    "_start",
    "dd_procmgr_reload::fault::capture",
    "dd_procmgr_reload::fault::install_hook",
];

/// Trait impls of the standard library show up as `<T as core::..>::f`.
const INTERNAL_IMPLS: &[&str] = &[" as core::", " as std::", " as alloc::"];

/// Source locations of the toolchain and of registry crates.
const INTERNAL_LOCATIONS: &[&str] = &[
    "/library/std/src/",
    "/library/core/src/",
    "/library/alloc/src/",
    "/.cargo/registry/",
];

/// A panic caught by [`capture`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub message: String,
    /// Frames of the panicking thread, runtime internals removed.
    pub backtrace: Vec<String>,
}

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    static LAST_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

// The hook stays installed for the life of the process. Panics outside a
// `capture` call on this thread still go to the previous hook.
fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if CAPTURING.with(Cell::get) {
                let trace = Backtrace::force_capture().to_string();
                LAST_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            } else {
                previous(info);
            }
        }));
    });
}

/// Run `f`, converting a panic into a [`Fault`].
pub fn capture<T>(f: impl FnOnce() -> T) -> Result<T, Fault> {
    install_hook();
    let outer = CAPTURING.with(|flag| flag.replace(true));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    CAPTURING.with(|flag| flag.set(outer));

    result.map_err(|payload| {
        let trace = LAST_TRACE
            .with(|slot| slot.borrow_mut().take())
            .unwrap_or_default();
        Fault {
            message: panic_message(payload.as_ref()),
            backtrace: filter_backtrace(&trace),
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unexpected fault".to_string()
    }
}

/// Parse the text form of a `std::backtrace::Backtrace` into one entry per
/// frame (`symbol` or `symbol at file:line:col`), dropping internal frames.
pub fn filter_backtrace(raw: &str) -> Vec<String> {
    let mut frames: Vec<(String, Option<String>)> = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if let Some(location) = line.strip_prefix("at ") {
            if let Some((_, slot @ None)) = frames.last_mut() {
                *slot = Some(location.to_string());
            }
        } else if let Some((index, symbol)) = line.split_once(": ")
            && !index.is_empty()
            && index.bytes().all(|b| b.is_ascii_digit())
        {
            frames.push((symbol.to_string(), None));
        }
    }

    frames
        .into_iter()
        .filter(|(symbol, location)| !is_internal(symbol, location.as_deref()))
        .map(|(symbol, location)| match location {
            Some(location) => format!("{symbol} at {location}"),
            None => symbol,
        })
        .collect()
}

fn is_internal(symbol: &str, location: Option<&str>) -> bool {
    if let Some(location) = location
        && (location.starts_with("/rustc/")
            || INTERNAL_LOCATIONS.iter().any(|dir| location.contains(dir)))
    {
        return true;
    }
    if symbol == "<unknown>" || INTERNAL_IMPLS.iter().any(|infix| symbol.contains(infix)) {
        return true;
    }
    let symbol = symbol.trim_start_matches('<');
    INTERNAL_FRAMES
        .iter()
        .any(|prefix| symbol.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACE: &str = "   0: std::backtrace_rs::backtrace::libunwind::trace
             at /rustc/abc/library/std/src/../../backtrace/src/backtrace/libunwind.rs:116:5
   1: std::backtrace::Backtrace::force_capture
   2: dd_procmgr_reload::fault::install_hook::{{closure}}::{{closure}}
             at ./src/fault.rs:60:29
   3: core::panicking::panic_fmt
   4: dd_procmgr_reload::reconcile::Staged::group
             at ./src/reconcile.rs:210:9
   5: <alloc::boxed::Box<F,A> as core::ops::function::FnOnce<Args>>::call_once
   6: <usize as core::slice::index::SliceIndex<[T]>>::index
             at /rustc/abc/library/core/src/slice/index.rs:255:10
   7: <dd_procmgr_reload::validate::TreeValidator as dd_procmgr_reload::validate::Validator>::validate
             at ./src/validate.rs:40:9
   8: hashbrown::raw::RawTable<T,A>::find
             at /home/ci/.cargo/registry/src/index.crates.io-6f17d22bba15001f/hashbrown-0.14.5/src/raw/mod.rs:1080:19
   9: dd_procmgr_reload::controller::Controller::apply
             at ./src/controller.rs:120:22
  10: <unknown>
  11: __libc_start_main
  12: _start
";

    #[test]
    fn test_filter_backtrace_keeps_user_frames() {
        assert_eq!(
            filter_backtrace(TRACE),
            vec![
                "dd_procmgr_reload::reconcile::Staged::group at ./src/reconcile.rs:210:9",
                "<dd_procmgr_reload::validate::TreeValidator as dd_procmgr_reload::validate::Validator>::validate at ./src/validate.rs:40:9",
                "dd_procmgr_reload::controller::Controller::apply at ./src/controller.rs:120:22",
            ]
        );
    }

    #[test]
    fn test_filter_backtrace_frame_without_location() {
        let raw = "   0: my_crate::run\n   1: core::ops::function::FnOnce::call_once\n";
        assert_eq!(filter_backtrace(raw), vec!["my_crate::run"]);
    }

    #[test]
    fn test_filter_backtrace_empty_or_disabled() {
        assert!(filter_backtrace("").is_empty());
        assert!(filter_backtrace("disabled backtrace").is_empty());
    }

    #[test]
    fn test_capture_passes_value_through() {
        assert_eq!(capture(|| 40 + 2), Ok(42));
    }

    #[test]
    fn test_filter_backtrace_drops_toolchain_location() {
        let raw = "   0: my_crate::run\n             at /rustc/abc/library/std/src/rt.rs:10:5\n   1: my_crate::main\n             at ./src/main.rs:3:5\n";
        assert_eq!(
            filter_backtrace(raw),
            vec!["my_crate::main at ./src/main.rs:3:5"]
        );
    }

    fn assert_no_runtime_frames(frames: &[String]) {
        for frame in frames {
            assert!(!frame.contains("/rustc/"), "toolchain frame kept: {frame}");
            assert!(!frame.contains(" as core::"), "core impl frame kept: {frame}");
            assert!(!frame.contains(" as std::"), "std impl frame kept: {frame}");
            assert!(!frame.contains("<unknown>"), "unresolved frame kept: {frame}");
        }
    }

    #[test]
    fn test_capture_str_panic() {
        let fault = capture(|| -> u32 { panic!("boom") }).unwrap_err();
        assert_eq!(fault.message, "boom");
        assert_no_runtime_frames(&fault.backtrace);
    }

    #[test]
    fn test_capture_index_panic_keeps_only_user_frames() {
        let items: Vec<u32> = (1..=3).collect();
        let index = items.len() + 2;
        let fault = capture(|| items[index]).unwrap_err();
        assert!(fault.message.contains("index out of bounds"), "{}", fault.message);
        assert_no_runtime_frames(&fault.backtrace);
    }

    #[test]
    fn test_capture_formatted_panic() {
        let name = "web";
        let fault = capture(|| -> u32 { panic!("bad app {name}") }).unwrap_err();
        assert_eq!(fault.message, "bad app web");
    }

    #[test]
    fn test_capture_is_reusable_after_fault() {
        assert!(capture(|| -> u32 { panic!("first") }).is_err());
        assert_eq!(capture(|| "second"), Ok("second"));
    }

    #[test]
    fn test_nested_capture_restores_flag() {
        let outer = capture(|| {
            let inner = capture(|| -> u32 { panic!("inner") });
            assert!(inner.is_err());
            CAPTURING.with(Cell::get)
        });
        assert_eq!(outer, Ok(true));
        assert!(!CAPTURING.with(Cell::get));
    }
}
