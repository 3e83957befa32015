// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sentryline

//! Identity resolution - authorized names and face-embedding gallery

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{bail, Result};
use tracing::{debug, info};

use super::{Detection, Identity};

/// Known faces as unit-normalized embeddings
#[derive(Debug, Clone)]
pub struct IdentityGallery {
    names: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    threshold: f32,
}

impl IdentityGallery {
    pub fn empty(threshold: f32) -> Self {
        Self {
            names: Vec::new(),
            embeddings: Vec::new(),
            threshold,
        }
    }

    /// Load a gallery from a JSON object mapping names to embedding vectors
    pub fn load(path: &Path, threshold: f32) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let raw: BTreeMap<String, Vec<f32>> = serde_json::from_str(&content)?;

        let mut gallery = Self::empty(threshold);
        for (name, embedding) in raw {
            gallery.register(&name, embedding)?;
        }

        info!("Loaded {} known faces from {:?}", gallery.len(), path);
        Ok(gallery)
    }

    pub fn register(&mut self, name: &str, embedding: Vec<f32>) -> Result<()> {
        let Some(normed) = normalize(embedding) else {
            bail!("embedding for '{}' is empty or zero-length", name);
        };
        if let Some(first) = self.embeddings.first() {
            if first.len() != normed.len() {
                bail!(
                    "embedding for '{}' has {} dimensions, gallery uses {}",
                    name,
                    normed.len(),
                    first.len()
                );
            }
        }
        self.names.push(name.to_string());
        self.embeddings.push(normed);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Best cosine match at or above the threshold, otherwise unknown
    pub fn recognize(&self, embedding: &[f32]) -> Identity {
        let Some(query) = normalize(embedding.to_vec()) else {
            return Identity::Unknown;
        };

        let best = self
            .embeddings
            .iter()
            .enumerate()
            .filter(|(_, known)| known.len() == query.len())
            .map(|(i, known)| (i, dot(known, &query)))
            .max_by(|a, b| a.1.total_cmp(&b.1));

        match best {
            Some((i, score)) => {
                debug!(name = %self.names[i], score, "best face match");
                if score >= self.threshold {
                    Identity::Known(self.names[i].clone())
                } else {
                    Identity::Unknown
                }
            }
            None => Identity::Unknown,
        }
    }
}

/// Decides whether a geofence-positive detection belongs to an authorized person
#[derive(Debug, Clone)]
pub struct IdentityGate {
    authorized: HashSet<String>,
    gallery: IdentityGallery,
}

impl IdentityGate {
    pub fn new(authorized: impl IntoIterator<Item = String>, gallery: IdentityGallery) -> Self {
        let mut authorized: HashSet<String> = authorized.into_iter().collect();
        authorized.extend(gallery.names().map(str::to_string));
        Self { authorized, gallery }
    }

    /// Identity label wins over embedding; no signal at all counts as unknown
    pub fn resolve(&self, detection: &Detection) -> Identity {
        if let Some(identity) = &detection.identity {
            return identity.clone();
        }
        match &detection.embedding {
            Some(embedding) => self.gallery.recognize(embedding),
            None => Identity::Unknown,
        }
    }

    pub fn is_authorized(&self, identity: &Identity) -> bool {
        identity
            .name()
            .map(|name| self.authorized.contains(name))
            .unwrap_or(false)
    }

    pub fn authorized_count(&self) -> usize {
        self.authorized.len()
    }
}

fn normalize(v: Vec<f32>) -> Option<Vec<f32>> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if v.is_empty() || !norm.is_finite() || norm == 0.0 {
        return None;
    }
    Some(v.into_iter().map(|x| x / norm).collect())
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BoundingBox;

    fn gallery() -> IdentityGallery {
        let mut g = IdentityGallery::empty(0.30);
        g.register("alice", vec![1.0, 0.0, 0.0]).unwrap();
        g.register("bob", vec![0.0, 2.0, 0.0]).unwrap();
        g
    }

    #[test]
    fn test_recognize_best_match() {
        let g = gallery();
        assert_eq!(g.recognize(&[0.9, 0.1, 0.0]), Identity::Known("alice".to_string()));
        assert_eq!(g.recognize(&[0.1, 5.0, 0.0]), Identity::Known("bob".to_string()));
        assert_eq!(g.recognize(&[0.0, 0.0, 1.0]), Identity::Unknown);
        assert_eq!(g.recognize(&[0.0, 0.0]), Identity::Unknown);
    }

    #[test]
    fn test_empty_gallery_is_unknown() {
        let g = IdentityGallery::empty(0.30);
        assert_eq!(g.recognize(&[1.0, 0.0]), Identity::Unknown);
    }

    #[test]
    fn test_register_rejects_bad_embeddings() {
        let mut g = gallery();
        assert!(g.register("zero", vec![0.0, 0.0, 0.0]).is_err());
        assert!(g.register("short", vec![1.0]).is_err());
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn test_gate_resolution() {
        let gate = IdentityGate::new(vec!["carol".to_string()], gallery());
        let det = Detection::new(1, BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.9);

        assert_eq!(gate.resolve(&det), Identity::Unknown);

        let labelled = det.clone().with_identity(Identity::Known("carol".to_string()));
        assert!(gate.is_authorized(&gate.resolve(&labelled)));

        let embedded = det.clone().with_embedding(vec![0.0, 1.0, 0.1]);
        assert!(gate.is_authorized(&gate.resolve(&embedded)));

        let stranger = det.with_identity(Identity::Known("mallory".to_string()));
        assert!(!gate.is_authorized(&gate.resolve(&stranger)));
        assert!(!gate.is_authorized(&Identity::Unknown));
        assert_eq!(gate.authorized_count(), 3);
    }

    #[test]
    fn test_load_gallery_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faces.json");
        std::fs::write(&path, r#"{"alice":[1.0,0.0],"bob":[0.0,1.0]}"#).unwrap();

        let g = IdentityGallery::load(&path, 0.3).unwrap();
        assert_eq!(g.len(), 2);
        assert_eq!(g.recognize(&[0.0, 3.0]), Identity::Known("bob".to_string()));
    }
}
