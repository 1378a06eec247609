use crate::Dossier;
use crate::engine::RenderedDocument;
use crate::error::DossierError;
use crate::generator::ContentGenerator;
use crate::theme::Theme;
use rayon::prelude::*;
use std::sync::Arc;

/// One document to render: what to say and how it should look.
pub struct BatchJob {
    pub generator: Box<dyn ContentGenerator + Send + Sync>,
    pub theme: Arc<dyn Theme>,
}

impl BatchJob {
    pub fn new(generator: impl ContentGenerator + Send + Sync + 'static, theme: Arc<dyn Theme>) -> Self {
        Self {
            generator: Box::new(generator),
            theme,
        }
    }
}

/// Renders independent documents in parallel, one engine per job. Results come
/// back in job order; a failed job does not affect the others.
pub fn render_batch(
    dossier: &Dossier,
    jobs: &[BatchJob],
) -> Vec<Result<RenderedDocument, DossierError>> {
    jobs.par_iter()
        .map(|job| dossier.render(job.generator.as_ref(), job.theme.clone()))
        .collect()
}
