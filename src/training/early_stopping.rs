//! Early stopping on the training loss with best-weight restoration.

/// Tracks the best loss of a phase and when to stop.
///
/// Any strict decrease counts as an improvement. After `patience`
/// consecutive epochs without one, [`EarlyStopping::update`] reports a stop.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    best_loss: f64,
    best_epoch: usize,
    wait: usize,
}

/// Outcome of feeding one epoch's loss
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochVerdict {
    /// New best; snapshot the weights
    Improved,
    Continue,
    Stop,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best_loss: f64::INFINITY,
            best_epoch: 0,
            wait: 0,
        }
    }

    pub fn update(&mut self, epoch: usize, loss: f64) -> EpochVerdict {
        if loss < self.best_loss {
            self.best_loss = loss;
            self.best_epoch = epoch;
            self.wait = 0;
            return EpochVerdict::Improved;
        }

        self.wait += 1;
        if self.wait >= self.patience {
            EpochVerdict::Stop
        } else {
            EpochVerdict::Continue
        }
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    pub fn best_epoch(&self) -> usize {
        self.best_epoch
    }

    pub fn patience(&self) -> usize {
        self.patience
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stops_after_patience() {
        let mut es = EarlyStopping::new(3);
        assert_eq!(es.update(0, 1.0), EpochVerdict::Improved);
        assert_eq!(es.update(1, 0.8), EpochVerdict::Improved);
        assert_eq!(es.update(2, 0.9), EpochVerdict::Continue);
        assert_eq!(es.update(3, 0.8), EpochVerdict::Continue);
        assert_eq!(es.update(4, 0.85), EpochVerdict::Stop);
        assert_eq!(es.best_epoch(), 1);
        assert!((es.best_loss() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_improvement_resets_wait() {
        let mut es = EarlyStopping::new(2);
        es.update(0, 1.0);
        assert_eq!(es.update(1, 1.1), EpochVerdict::Continue);
        assert_eq!(es.update(2, 0.5), EpochVerdict::Improved);
        assert_eq!(es.update(3, 0.6), EpochVerdict::Continue);
        assert_eq!(es.update(4, 0.6), EpochVerdict::Stop);
    }

    #[test]
    fn test_nan_loss_never_improves() {
        let mut es = EarlyStopping::new(1);
        es.update(0, 0.7);
        assert_eq!(es.update(1, f64::NAN), EpochVerdict::Stop);
    }
}
