// ─── Openlock Core ───
// Modular backend for depot manifest and key retrieval.
//
// Architecture:
//   core/
//     github/     — Candidate resolution, tree listings, rate probe
//     cdn/        — Single-file retrieval with endpoint failover
//     assembler/  — Tree walk, manifest cache, credential/version map
//     tools/      — SteamTools and GreenLuma unlock strategies
//     region      — Domestic-network probe (selects the endpoint list)
//     steam       — Install discovery + app-id normalization
//     config      — Explicit on-disk configuration
//     http        — Shared HTTP client construction

pub mod assembler;
pub mod cdn;
pub mod config;
pub mod error;
pub mod github;
pub mod http;
pub mod region;
pub mod steam;
pub mod tools;
