//! Batch weight import onto destination meshes.

use rayon::prelude::*;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use skinner_config::{ConfigError, ImportConfig};
use weights::{ChunkStore, InfluenceWeights, MergedCloud, PoseSpace, SampleCloud, SkinningMethod};

use crate::destination::DestinationMesh;
use crate::error::ImportError;
use crate::fallback::{FallbackEngine, VertexResult, VertexStrategy};
use crate::report::{ImportReport, MeshFailure};
use crate::resolver::{FallbackCloud, ImportPlan, PlanKind, resolve};
use crate::smoothing::{should_smooth, smooth};
use crate::spatial::{BackendBuilder, IndexBuilder, PointIndex};

/// Weights resolved for one destination mesh.
#[derive(Debug, Clone)]
pub struct MeshImport {
    pub mesh_name: String,
    pub plan: PlanKind,
    /// Chunk name (quoted) or "merged cloud"
    pub source: String,
    /// Governing skinning method for the applied weights
    pub skinning_method: SkinningMethod,
    /// One entry per requested vertex, in request order
    pub vertices: Vec<VertexResult>,
    pub smoothed: usize,
    pub elapsed: Duration,
}

impl MeshImport {
    /// Number of vertices per strategy.
    pub fn strategy_counts(&self) -> HashMap<VertexStrategy, usize> {
        let mut counts = HashMap::new();
        for vertex in &self.vertices {
            *counts.entry(vertex.strategy).or_insert(0) += 1;
        }
        counts
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CloudKey {
    Chunk(String),
    Merged,
}

/// State shared by every mesh of one import call.
///
/// Holds the merged cloud and the spatial indexes built so far; dropped at
/// the end of the call so nothing leaks into the next import.
struct ImportSession<'s> {
    store: &'s ChunkStore,
    merged: Option<MergedCloud>,
    indexes: HashMap<(CloudKey, PoseSpace), Box<dyn PointIndex>>,
}

impl<'s> ImportSession<'s> {
    fn new(store: &'s ChunkStore) -> Self {
        Self {
            store,
            merged: None,
            indexes: HashMap::new(),
        }
    }
}

/// Runs imports with one validated configuration.
pub struct Importer {
    config: ImportConfig,
    builder: Box<dyn IndexBuilder>,
}

impl std::fmt::Debug for Importer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Importer")
            .field("config", &self.config)
            .field("index_builder", &self.builder.name())
            .finish()
    }
}

impl Importer {
    pub fn new(config: ImportConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let builder = Box::new(BackendBuilder(config.spatial_backend));
        Ok(Self { config, builder })
    }

    /// Replace the configured spatial backend with a custom one.
    pub fn with_index_builder(mut self, builder: impl IndexBuilder + 'static) -> Self {
        self.builder = Box::new(builder);
        self
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Import every mesh against `store`.
    ///
    /// Never fails as a whole: each mesh lands in the report as a success
    /// or a failure, independently of its siblings.
    pub fn import(&self, store: &ChunkStore, meshes: &[DestinationMesh]) -> ImportReport {
        let started = Instant::now();
        let mut session = ImportSession::new(store);
        let mut report = ImportReport::default();

        for mesh in meshes {
            let mesh_started = Instant::now();
            match self.import_mesh(&mut session, mesh) {
                Ok(import) => {
                    info!(
                        "Imported '{}' ({}, from {}) in {:.2} ms",
                        import.mesh_name,
                        import.plan,
                        import.source,
                        import.elapsed.as_secs_f64() * 1000.0
                    );
                    report.succeeded.push(import);
                }
                Err(error) => {
                    warn!("Import failed for '{}': {}", mesh.name, error);
                    report.failed.push(MeshFailure {
                        mesh_name: mesh.name.clone(),
                        error,
                        elapsed: mesh_started.elapsed(),
                    });
                }
            }
        }

        report.elapsed = started.elapsed();
        report
    }

    fn import_mesh(
        &self,
        session: &mut ImportSession<'_>,
        mesh: &DestinationMesh,
    ) -> Result<MeshImport, ImportError> {
        let started = Instant::now();
        mesh.validate()?;
        let plan = resolve(mesh, session.store, &self.config)?;
        debug!("Plan for '{}': {:?}", mesh.name, plan.kind());

        let mut smoothed = 0;
        let (vertices, skinning_method) = match &plan {
            ImportPlan::DirectSingleInfluence { chunk, influence } => {
                let vertices: Vec<VertexResult> = mesh
                    .vertices
                    .iter()
                    .map(|v| {
                        VertexResult::new(
                            v.index,
                            InfluenceWeights::single(influence.as_str()),
                            VertexStrategy::SingleInfluence,
                        )
                    })
                    .collect();
                (vertices, mesh.skinning_method.unwrap_or(chunk.skinning_method()))
            }
            ImportPlan::DirectByIndex { chunk, .. } => {
                let method = mesh.skinning_method.unwrap_or(chunk.skinning_method());
                let carry_blend = method.uses_blend_weights();
                let lookup = chunk.index_lookup();
                let vertices = mesh
                    .vertices
                    .iter()
                    .map(|v| -> Result<VertexResult, ImportError> {
                        let slot = lookup.get(&v.index).ok_or_else(|| ImportError::MissingSample {
                            mesh: mesh.name.clone(),
                            chunk: chunk.mesh_name().to_string(),
                            index: v.index,
                        })?;
                        let sample = &chunk.samples()[*slot];
                        let mut result = VertexResult::new(
                            v.index,
                            sample.weights.clone(),
                            VertexStrategy::ByIndex,
                        );
                        result.blend_weight = sample.blend_weight.filter(|_| carry_blend);
                        Ok(result)
                    })
                    .collect::<Result<Vec<_>, ImportError>>()?;
                (vertices, method)
            }
            ImportPlan::Fallback {
                cloud,
                use_normal_filter,
                ..
            } => {
                let (cloud_ref, key, method): (&dyn SampleCloud, CloudKey, SkinningMethod) =
                    match cloud {
                        FallbackCloud::Chunk(chunk) => (
                            &**chunk as &dyn SampleCloud,
                            CloudKey::Chunk(chunk.mesh_name().to_string()),
                            mesh.skinning_method.unwrap_or(chunk.skinning_method()),
                        ),
                        FallbackCloud::Merged => {
                            let store = session.store;
                            let merged =
                                session.merged.get_or_insert_with(|| store.merged_cloud());
                            (
                                &*merged as &dyn SampleCloud,
                                CloudKey::Merged,
                                mesh.skinning_method.unwrap_or_default(),
                            )
                        }
                    };

                if cloud_ref.is_empty() {
                    return Err(ImportError::EmptyCloud {
                        mesh: mesh.name.clone(),
                        source_name: plan.source(),
                    });
                }

                let space = if self.config.use_pre_deformed
                    && mesh.has_pre_deformed()
                    && cloud_ref.has_pre_deformed()
                {
                    PoseSpace::PreDeformed
                } else {
                    PoseSpace::Current
                };

                let builder = &self.builder;
                let index = session.indexes.entry((key, space)).or_insert_with(|| {
                    debug!(
                        "Building {} index over {} samples ({:?} pose)",
                        builder.name(),
                        cloud_ref.len(),
                        space
                    );
                    builder.build(&cloud_ref.positions(space))
                });
                let index: &dyn PointIndex = &**index;

                let mut config = self.config.clone();
                config.use_normal_filter = *use_normal_filter;
                let engine = FallbackEngine::new(cloud_ref, index, space, &config)
                    .with_blend_weights(method.uses_blend_weights());
                let mut vertices = engine.resolve_all(&mesh.vertices);

                let filtered_out = vertices
                    .iter()
                    .filter(|v| v.strategy == VertexStrategy::NormalFilterFallback)
                    .count();
                if filtered_out > 0 {
                    warn!(
                        "Normal filter rejected every candidate for {} vertices of '{}'; \
                         used closest point",
                        filtered_out, mesh.name
                    );
                }

                if let Some(adjacency) = &mesh.adjacency {
                    if should_smooth(&self.config, mesh.requested_count(), cloud_ref.len()) {
                        let tolerance = self.config.exact_match_tolerance;
                        let locked: Vec<bool> = mesh
                            .vertices
                            .par_iter()
                            .map(|v| {
                                index
                                    .nearest_one(v.pose(space).position)
                                    .is_some_and(|nearest| nearest.distance <= tolerance)
                            })
                            .collect();
                        smoothed = smooth(&mut vertices, adjacency, &locked, &self.config);
                        debug!("Smoothed {} vertices of '{}'", smoothed, mesh.name);
                    }
                }

                (vertices, method)
            }
        };

        Ok(MeshImport {
            mesh_name: mesh.name.clone(),
            plan: plan.kind(),
            source: plan.source(),
            skinning_method,
            vertices,
            smoothed,
            elapsed: started.elapsed(),
        })
    }
}
