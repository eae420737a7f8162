//! Handing resolved weights to the host.

use std::collections::HashMap;
use std::fmt::Display;
use tracing::warn;

use crate::error::ImportError;
use crate::fallback::VertexResult;
use crate::importer::MeshImport;
use crate::report::{ImportReport, MeshFailure};

/// Receives the final weights of each successfully imported mesh.
pub trait WeightApplier {
    type Error: Display;

    fn apply(&mut self, import: &MeshImport) -> Result<(), Self::Error>;
}

/// Apply every successful mesh in `report`.
///
/// A mesh the applier rejects moves to the failure list; its siblings are
/// unaffected.
pub fn apply_report<A: WeightApplier + ?Sized>(
    mut report: ImportReport,
    applier: &mut A,
) -> ImportReport {
    let succeeded = std::mem::take(&mut report.succeeded);
    for import in succeeded {
        match applier.apply(&import) {
            Ok(()) => report.succeeded.push(import),
            Err(error) => {
                warn!("Applying weights to '{}' failed: {}", import.mesh_name, error);
                report.failed.push(MeshFailure {
                    mesh_name: import.mesh_name.clone(),
                    error: ImportError::Applier {
                        mesh: import.mesh_name,
                        reason: error.to_string(),
                    },
                    elapsed: import.elapsed,
                });
            }
        }
    }
    report
}

/// Applier that keeps the weights in memory, keyed by mesh and vertex.
#[derive(Debug, Default)]
pub struct CollectingApplier {
    meshes: HashMap<String, HashMap<u32, VertexResult>>,
}

impl CollectingApplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mesh(&self, name: &str) -> Option<&HashMap<u32, VertexResult>> {
        self.meshes.get(name)
    }

    pub fn vertex(&self, mesh: &str, index: u32) -> Option<&VertexResult> {
        self.meshes.get(mesh).and_then(|vertices| vertices.get(&index))
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

impl WeightApplier for CollectingApplier {
    type Error = std::convert::Infallible;

    fn apply(&mut self, import: &MeshImport) -> Result<(), Self::Error> {
        let vertices = import
            .vertices
            .iter()
            .map(|vertex| (vertex.index, vertex.clone()))
            .collect();
        self.meshes.insert(import.mesh_name.clone(), vertices);
        Ok(())
    }
}
