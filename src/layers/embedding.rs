//! Embedding of species, radial features and global state.

use candle_core::Tensor;
use candle_nn::{Embedding, Module, VarBuilder, embedding};
use serde::{Deserialize, Serialize};

use super::activation::Activation;
use super::mlp::Mlp;
use crate::config::GraphConfig;
use crate::error::Error;

/// How global state attributes are embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StateEmbedding {
    /// State attributes pass through unchanged.
    #[default]
    None,

    /// Integer state labels looked up in a table of `num_states` rows.
    Categorical { num_states: usize, dim: usize },

    /// Real-valued state vectors of width `num_feats` mapped through an MLP.
    Continuous { num_feats: usize, dim: usize },
}

#[derive(Debug, Clone)]
enum StateEncoder {
    Identity,
    Table(Embedding),
    Dense(Mlp),
}

/// Dense features produced by [`EmbeddingBlock::forward`].
#[derive(Debug, Clone)]
pub struct Embedded {
    /// `(N, num_node_feats)`
    pub node_feat: Tensor,
    /// `(E, num_edge_feats)`, or the radial features when no edge
    /// embedding is configured.
    pub edge_feat: Tensor,
    pub state_feat: Option<Tensor>,
}

/// Maps species indices, radial edge features and state attributes into
/// learned feature vectors, each through its own transform.
#[derive(Debug, Clone)]
pub struct EmbeddingBlock {
    node: Embedding,
    edge: Option<Mlp>,
    state: StateEncoder,
}

impl EmbeddingBlock {
    /// Creates the embedding block.
    ///
    /// # Arguments
    ///
    /// * `num_species` - Size of the element vocabulary
    /// * `num_node_feats` - Width of node embeddings
    /// * `degree_rbf` - Width of the radial edge features
    /// * `num_edge_feats` - Width of edge embeddings, `None` to pass radial
    ///   features through
    /// * `state` - State embedding mode
    /// * `activation` - Nonlinearity of the edge and state transforms
    /// * `vb` - Parameter source
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for zero widths.
    pub fn new(
        num_species: usize,
        num_node_feats: usize,
        degree_rbf: usize,
        num_edge_feats: Option<usize>,
        state: StateEmbedding,
        activation: Activation,
        vb: VarBuilder,
    ) -> Result<Self, Error> {
        if num_species == 0 || num_node_feats == 0 {
            return Err(Error::InvalidConfig(
                "node embedding needs at least one species and one feature".to_string(),
            ));
        }
        let node = embedding(num_species, num_node_feats, vb.pp("node_embedding"))?;

        let edge = num_edge_feats
            .map(|dim| Mlp::new(&[degree_rbf, dim], activation, true, vb.pp("edge_embedding")))
            .transpose()?;

        let state = match state {
            StateEmbedding::None => StateEncoder::Identity,
            StateEmbedding::Categorical { num_states, dim } => {
                if num_states == 0 || dim == 0 {
                    return Err(Error::InvalidConfig(
                        "categorical state embedding needs non-zero sizes".to_string(),
                    ));
                }
                StateEncoder::Table(embedding(num_states, dim, vb.pp("state_embedding"))?)
            }
            StateEmbedding::Continuous { num_feats, dim } => StateEncoder::Dense(Mlp::new(
                &[num_feats, dim],
                activation,
                true,
                vb.pp("state_embedding"),
            )?),
        };

        Ok(Self { node, edge, state })
    }

    /// Creates the block with the widths, state mode and activation of
    /// `config`. Radial inputs have [`GraphConfig::bond_width`] columns.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`GraphConfig::validate`] and
    /// [`EmbeddingBlock::new`].
    pub fn from_config(
        config: &GraphConfig,
        num_species: usize,
        vb: VarBuilder,
    ) -> Result<Self, Error> {
        config.validate()?;
        Self::new(
            num_species,
            config.num_node_feats,
            config.bond_width(),
            Some(config.num_edge_feats),
            config.state_embedding,
            config.activation,
            vb,
        )
    }

    /// Embeds one graph's inputs.
    ///
    /// # Arguments
    ///
    /// * `node_types` - `(N,)` `U32` species indices
    /// * `edge_rbf` - `(E, degree_rbf)` radial features
    /// * `state_attr` - `(B,)` `U32` labels for categorical state,
    ///   `(B, num_feats)` values for continuous state, anything otherwise
    pub fn forward(
        &self,
        node_types: &Tensor,
        edge_rbf: &Tensor,
        state_attr: Option<&Tensor>,
    ) -> Result<Embedded, Error> {
        let node_feat = self.node.forward(node_types)?;
        let edge_feat = match &self.edge {
            Some(mlp) => mlp.forward(edge_rbf)?,
            None => edge_rbf.clone(),
        };
        let state_feat = match (&self.state, state_attr) {
            (_, None) => None,
            (StateEncoder::Identity, Some(s)) => Some(s.clone()),
            (StateEncoder::Table(table), Some(s)) => Some(table.forward(s)?),
            (StateEncoder::Dense(mlp), Some(s)) => Some(mlp.forward(s)?),
        };
        Ok(Embedded {
            node_feat,
            edge_feat,
            state_feat,
        })
    }
}
