// SYNOID Agent Modules
// Copyright (c) 2026 Xing_The_Creator | SYNOID

pub mod collaborators;
pub mod dub_job;
pub mod dub_pipeline;
pub mod production_tools;
pub mod source_tools;
pub mod transcription;
pub mod voice;
