//! Cross-module scenario tests for the planning pipeline.
