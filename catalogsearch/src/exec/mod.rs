// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query execution: search stages, windowed fetching and counting

pub mod classification;
pub mod context;
pub mod counter;
pub mod entity;
pub mod perf;
pub mod pipeline;
pub mod processor;
pub mod termination;
pub mod window;

pub use classification::ClassificationSearchProcessor;
pub use context::QueryContext;
pub use counter::ResultCounter;
pub use entity::EntitySearchProcessor;
pub use perf::PerfTracer;
pub use pipeline::ProcessorChain;
pub use processor::{filter_next, ProcessorOutput, SearchBackends, SearchProcessor};
pub use termination::{TerminationReason, TerminationSignal};
pub use window::{Batch, BatchSource, ResultWindow, WindowState};
