//! Aggregate results of an import batch.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::time::Duration;

use crate::error::ImportError;
use crate::fallback::VertexStrategy;
use crate::importer::MeshImport;
use crate::resolver::PlanKind;

/// A destination mesh that could not be imported.
#[derive(Debug)]
pub struct MeshFailure {
    pub mesh_name: String,
    pub error: ImportError,
    pub elapsed: Duration,
}

/// How [`ImportReport::overview`] groups meshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverviewMode {
    /// One section per import strategy
    #[default]
    ByImportType,
    /// One line per mesh
    ByMesh,
}

/// Outcome of one import call: every requested mesh appears exactly once.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub succeeded: Vec<MeshImport>,
    pub failed: Vec<MeshFailure>,
    pub elapsed: Duration,
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

impl ImportReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn get(&self, mesh_name: &str) -> Option<&MeshImport> {
        self.succeeded.iter().find(|import| import.mesh_name == mesh_name)
    }

    pub fn failure(&self, mesh_name: &str) -> Option<&MeshFailure> {
        self.failed.iter().find(|failure| failure.mesh_name == mesh_name)
    }

    /// Vertex count per strategy across every successful mesh.
    pub fn strategy_breakdown(&self) -> BTreeMap<VertexStrategy, usize> {
        let mut breakdown = BTreeMap::new();
        for import in &self.succeeded {
            for vertex in &import.vertices {
                *breakdown.entry(vertex.strategy).or_insert(0) += 1;
            }
        }
        breakdown
    }

    pub fn total_vertices(&self) -> usize {
        self.succeeded.iter().map(|import| import.vertices.len()).sum()
    }

    /// Human-readable summary of the batch.
    pub fn overview(&self, mode: OverviewMode) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Imported {} of {} meshes in {:.2} ms",
            self.succeeded.len(),
            self.succeeded.len() + self.failed.len(),
            millis(self.elapsed)
        );

        if !self.succeeded.is_empty() {
            let _ = writeln!(out, "Succeeded:");
            match mode {
                OverviewMode::ByImportType => {
                    let mut groups: BTreeMap<PlanKind, Vec<&MeshImport>> = BTreeMap::new();
                    for import in &self.succeeded {
                        groups.entry(import.plan).or_default().push(import);
                    }
                    for (plan, imports) in groups {
                        let _ = writeln!(out, "  {}:", plan);
                        for import in imports {
                            let _ = writeln!(
                                out,
                                "    {} from {} ({} vertices, {:.2} ms)",
                                import.mesh_name,
                                import.source,
                                import.vertices.len(),
                                millis(import.elapsed)
                            );
                        }
                    }
                }
                OverviewMode::ByMesh => {
                    for import in &self.succeeded {
                        let _ = writeln!(
                            out,
                            "  {}: {} from {}, {} vertices, {} smoothed, {}, {:.2} ms",
                            import.mesh_name,
                            import.plan,
                            import.source,
                            import.vertices.len(),
                            import.smoothed,
                            import.skinning_method.label(),
                            millis(import.elapsed)
                        );
                    }
                }
            }

            let breakdown = self.strategy_breakdown();
            let parts: Vec<String> = breakdown
                .iter()
                .map(|(strategy, count)| format!("{} {}", count, strategy.label()))
                .collect();
            let _ = writeln!(out, "Vertices: {}", parts.join(", "));
        }

        if !self.failed.is_empty() {
            let _ = writeln!(out, "Failed:");
            for failure in &self.failed {
                let _ = writeln!(
                    out,
                    "  {}: {} ({:.2} ms)",
                    failure.mesh_name,
                    failure.error,
                    millis(failure.elapsed)
                );
            }
        }

        out
    }
}
