//! End-to-end pipeline conformance.
//!
//! Drives the full pipeline against the scripted agent and compiler,
//! exercising the seed scenarios: a plain iPhone build, a paired watch
//! project, policy rejection before any write, completion-gate
//! continuation, the fix loop, and session resumption across an edit.
