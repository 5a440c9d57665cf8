use rand::seq::SliceRandom;
use std::collections::VecDeque;
use tracing::{debug, info};

use super::track::QueueTrack;
use crate::error::{Error, Result};

/// Cola de un guild: secuencia ordenada más los slots `current` y `previous`.
///
/// `current` nunca forma parte de la secuencia. Las primitivas que mueven
/// elementos entre la secuencia y los slots son internas del crate.
#[derive(Debug, Clone, Default)]
pub struct Queue {
    tracks: VecDeque<QueueTrack>,
    current: Option<QueueTrack>,
    previous: Option<QueueTrack>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega un track. Sin track actual, pasa a ser el actual.
    pub fn add(&mut self, track: impl Into<QueueTrack>, offset: Option<usize>) -> Result<()> {
        self.add_many(vec![track.into()], offset)
    }

    /// Agrega varios tracks (playlist).
    ///
    /// Sin track actual el primero pasa a `current` y el resto se encola al
    /// final; si no, se insertan en `offset` (0..=len) o al final.
    pub fn add_many(&mut self, tracks: Vec<QueueTrack>, offset: Option<usize>) -> Result<()> {
        for track in &tracks {
            track.validate()?;
        }

        if let Some(offset) = offset {
            if offset > self.tracks.len() {
                return Err(Error::InvalidArgument(format!(
                    "El offset debe estar entre 0 y {}",
                    self.tracks.len()
                )));
            }
        }

        let mut tracks = tracks.into_iter();
        if self.current.is_none() {
            self.current = tracks.next();
            self.tracks.extend(tracks);
        } else if let Some(offset) = offset {
            for (i, track) in tracks.enumerate() {
                self.tracks.insert(offset + i, track);
            }
        } else {
            self.tracks.extend(tracks);
        }

        debug!("➕ Cola: {} en espera", self.tracks.len());
        Ok(())
    }

    /// Elimina el track en `position`
    pub fn remove(&mut self, position: usize) -> Result<Vec<QueueTrack>> {
        self.remove_range(position, position + 1)
    }

    /// Elimina el rango `[start, end)` y devuelve los tracks quitados
    pub fn remove_range(&mut self, start: usize, end: usize) -> Result<Vec<QueueTrack>> {
        if start >= end {
            return Err(Error::InvalidArgument(
                "El inicio debe ser menor que el final".to_string(),
            ));
        }
        if start >= self.tracks.len() {
            return Err(Error::InvalidArgument(format!(
                "Índice fuera de rango: {} (cola de {})",
                start,
                self.tracks.len()
            )));
        }

        let end = end.min(self.tracks.len());
        let removed: Vec<_> = self.tracks.drain(start..end).collect();
        debug!("❌ Eliminados {} tracks de la cola", removed.len());
        Ok(removed)
    }

    /// Limpia la cola (no toca `current`)
    pub fn clear(&mut self) {
        self.tracks.clear();
        info!("🗑️ Cola limpiada");
    }

    /// Mezcla la cola (Fisher–Yates)
    pub fn shuffle(&mut self) {
        let mut rng = rand::thread_rng();
        self.tracks.make_contiguous().shuffle(&mut rng);
        info!("🔀 Cola mezclada");
    }

    /// Deshace la mezcla ordenando por fecha de creación
    pub fn unshuffle(&mut self) {
        self.tracks.make_contiguous().sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.sort_key().cmp(b.sort_key()))
        });
        info!("➡️ Orden original restaurado");
    }

    pub fn current(&self) -> Option<&QueueTrack> {
        self.current.as_ref()
    }

    pub fn previous(&self) -> Option<&QueueTrack> {
        self.previous.as_ref()
    }

    pub fn get(&self, index: usize) -> Option<&QueueTrack> {
        self.tracks.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueTrack> {
        self.tracks.iter()
    }

    /// Tracks en espera (sin contar el actual)
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Tracks en espera más el actual
    pub fn total_size(&self) -> usize {
        self.tracks.len() + usize::from(self.current.is_some())
    }

    /// Duración total en ms, incluyendo el actual
    pub fn duration(&self) -> u64 {
        let queued: u64 = self.tracks.iter().map(QueueTrack::duration).sum();
        queued + self.current.as_ref().map_or(0, QueueTrack::duration)
    }

    // Primitivas internas usadas por el player

    /// previous ← current; current ← primero de la cola
    pub(crate) fn advance(&mut self) -> Option<&QueueTrack> {
        if let Some(current) = self.current.take() {
            self.previous = Some(current);
        }
        self.current = self.tracks.pop_front();
        self.current.as_ref()
    }

    /// Como [`advance`](Self::advance) pero el actual vuelve al final de la cola
    pub(crate) fn rotate(&mut self) -> Option<&QueueTrack> {
        if let Some(current) = self.current.take() {
            self.tracks.push_back(current.clone());
            self.previous = Some(current);
        }
        self.current = self.tracks.pop_front();
        self.current.as_ref()
    }

    /// previous ← current; current ← None
    pub(crate) fn finish(&mut self) {
        if let Some(current) = self.current.take() {
            self.previous = Some(current);
        }
    }

    /// Reemplaza el slot actual (el anterior no pasa a `previous`)
    pub(crate) fn set_current(&mut self, track: QueueTrack) {
        self.current = Some(track);
    }

    /// Sustituye `expected` por `replacement` si sigue siendo el actual
    pub(crate) fn replace_current(&mut self, expected: &QueueTrack, replacement: QueueTrack) -> bool {
        match &self.current {
            Some(current) if current == expected => {
                self.current = Some(replacement);
                true
            }
            _ => false,
        }
    }

    /// Vuelve a reproducir el anterior: current pasa al frente de la cola
    pub(crate) fn step_back(&mut self) -> Option<&QueueTrack> {
        let previous = self.previous.take()?;
        if let Some(current) = self.current.take() {
            self.tracks.push_front(current);
        }
        self.current = Some(previous);
        self.current.as_ref()
    }
}
