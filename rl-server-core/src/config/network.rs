//! Configuration of actor and critic networks.
use serde::{Deserialize, Serialize};

/// Configuration of an actor or a critic network.
///
/// The networks themselves are built by an
/// [`Algorithm`](crate::Algorithm) implementation; only the fields checked
/// before building live here.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct NetworkConfig {
    /// Uses a recurrent network over the stacked history.
    pub lstm_network: bool,

    /// Sizes of the hidden layers.
    pub hiddens: Vec<usize>,

    /// Applies layer normalization after hidden layers.
    pub layer_norm: bool,

    /// Uses noisy linear layers.
    pub noisy_layer: bool,

    /// Activation of the output layer.
    pub output_activation: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            lstm_network: false,
            hiddens: vec![256, 256],
            layer_norm: false,
            noisy_layer: false,
            output_activation: "tanh".to_string(),
        }
    }
}

impl NetworkConfig {
    /// Sets `lstm_network`.
    pub fn lstm_network(mut self, v: bool) -> Self {
        self.lstm_network = v;
        self
    }

    /// Sets the sizes of hidden layers.
    pub fn hiddens(mut self, v: Vec<usize>) -> Self {
        self.hiddens = v;
        self
    }
}
