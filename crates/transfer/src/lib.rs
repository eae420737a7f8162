//! Skin weight transfer onto destination meshes
//!
//! This crate decides, per destination mesh, how captured weights are
//! brought over and computes the final per-vertex weights:
//! - [`resolver`] - Import plan selection (single influence, by index, fallback)
//! - [`spatial`] - Nearest-neighbor indexes (octree, brute force, custom)
//! - [`fallback`] - Closest point / closest neighbors interpolation
//! - [`smoothing`] - Relaxation of weight discontinuities after fallback
//! - [`importer`] - Batch import with per-call index caching
//! - [`report`] - Per-mesh outcomes and overviews
//! - [`apply`] - Hand-off to the host's weight applier
//! - [`workflow`] - Export and import entry points over a chunk repository

pub mod apply;
pub mod destination;
pub mod error;
pub mod fallback;
pub mod importer;
pub mod report;
pub mod resolver;
pub mod smoothing;
pub mod spatial;
pub mod workflow;

pub use apply::{CollectingApplier, WeightApplier, apply_report};
pub use destination::{DestinationMesh, DestinationVertex};
pub use error::{ExportError, ImportError};
pub use fallback::{FallbackEngine, VertexResult, VertexStrategy};
pub use importer::{Importer, MeshImport};
pub use report::{ImportReport, MeshFailure, OverviewMode};
pub use resolver::{FallbackCloud, FallbackReason, ImportPlan, MatchKind, PlanKind, resolve};
pub use spatial::{BruteForceIndex, IndexBuilder, Neighbor, PointIndex, PointOctree, build_index};
pub use workflow::{export_skin, import_skin};
