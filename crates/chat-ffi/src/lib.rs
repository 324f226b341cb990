//! UniFFI bindings crate for the chat library
//!
//! This crate wraps the chat crate for UniFFI library mode binding generation.
//! It re-exports the FFI module and UniFFI scaffolding from the chat crate.
//!
//! ## Building for Swift
//!
//! 1. Build the library for Apple platforms:
//!    ```bash
//!    cargo build --release -p chat-ffi --target aarch64-apple-ios
//!    cargo build --release -p chat-ffi --target aarch64-apple-ios-sim
//!    ```
//!
//! 2. Generate Swift bindings:
//!    ```bash
//!    cargo run -p chat-ffi --features bindgen --bin uniffi-bindgen generate \
//!        --library target/aarch64-apple-ios/release/libchat_ffi.a \
//!        --language swift \
//!        --out-dir generated/swift
//!    ```
//!
//! Kotlin bindings are generated the same way with `--language kotlin`
//! against the Android `.so`.

// Re-export everything from the chat crate's FFI module
pub use chat::ffi::*;

// Library mode needs the scaffolding symbols in this artifact
chat::uniffi_reexport_scaffolding!();
