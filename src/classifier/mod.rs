// Trainable statistical classifier
// Random forest over the ten-field feature vector, with a trainer that
// builds models off the tick path and a predictor that hot-swaps them

pub mod forest;
pub mod predictor;
pub mod trainer;

pub use forest::RandomForest;
pub use predictor::{Prediction, Predictor};
pub use trainer::{can_train, train, TrainedModel, Trainer, TrainingError};
