//! disegno: an MCP render gateway for Mermaid diagrams.
//!
//! The service exposes a single `render_mermaid` tool over an MCP
//! (Model Context Protocol) JSON-RPC endpoint. Each call stages the diagram
//! source through an exclusive temp directory, invokes the external mermaid
//! CLI as a blocking subprocess, and relays the produced file — raw SVG
//! markup for text output, base64-encoded bytes for png and pdf.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
