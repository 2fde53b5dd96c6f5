//! Checkpoint parameters partitioned into trainable and frozen sets.
//!
//! The partition is computed once when the weights are loaded. Trainable
//! parameters are candle [`Var`]s; frozen ones are plain tensors and never
//! enter the autograd graph.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use candle_core::{DType, Device, Tensor, Var};
use candle_nn::VarBuilder;

use crate::error::{PipelineError, Result};

/// Sublayer role names whose parameters stay trainable, e.g. `query`, `value`.
///
/// A parameter matches a role when one of its dot-separated name segments
/// equals the role: `bert.encoder.layer.0.attention.self.query.weight`
/// matches `query`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrainableRoles(BTreeSet<String>);

impl TrainableRoles {
    /// Freeze everything.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(roles.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Role of `name`, if any.
    pub fn role_of(&self, name: &str) -> Option<&str> {
        name.split('.')
            .find_map(|segment| self.0.get(segment).map(String::as_str))
    }

    pub fn matches(&self, name: &str) -> bool {
        self.role_of(name).is_some()
    }
}

/// One named weight, tagged with its side of the partition.
#[derive(Debug, Clone)]
pub enum Parameter {
    Trainable(Var),
    Frozen(Tensor),
}

impl Parameter {
    pub fn as_tensor(&self) -> &Tensor {
        match self {
            Parameter::Trainable(var) => var.as_tensor(),
            Parameter::Frozen(tensor) => tensor,
        }
    }

    pub fn is_trainable(&self) -> bool {
        matches!(self, Parameter::Trainable(_))
    }
}

/// Every floating-point weight of a checkpoint, keyed by name.
#[derive(Debug, Clone)]
pub struct ParameterStore {
    params: BTreeMap<String, Parameter>,
}

impl ParameterStore {
    /// Read `model.safetensors` or `pytorch_model.bin` and partition it.
    ///
    /// Integer buffers (e.g. `position_ids`) are not parameters and are skipped.
    /// Fails when a role in `roles` matches no parameter.
    pub fn load(weights: &Path, device: &Device, roles: &TrainableRoles) -> Result<Self> {
        let raw: Vec<(String, Tensor)> =
            if weights.extension().is_some_and(|e| e == "safetensors") {
                candle_core::safetensors::load(weights, device)?
                    .into_iter()
                    .collect()
            } else {
                candle_core::pickle::read_all(weights)?
            };

        let mut tensors = HashMap::with_capacity(raw.len());
        for (name, tensor) in raw {
            if is_float(tensor.dtype()) {
                let tensor = tensor.to_dtype(DType::F32)?.to_device(device)?;
                tensors.insert(name, tensor);
            }
        }

        Self::from_tensors(tensors, roles)
    }

    pub fn from_tensors(tensors: HashMap<String, Tensor>, roles: &TrainableRoles) -> Result<Self> {
        let mut matched: BTreeSet<&str> = BTreeSet::new();
        let mut params = BTreeMap::new();

        for (name, tensor) in tensors {
            let param = match roles.role_of(&name) {
                Some(role) => {
                    matched.insert(role);
                    Parameter::Trainable(Var::from_tensor(&tensor)?)
                }
                None => Parameter::Frozen(tensor),
            };
            params.insert(name, param);
        }

        if let Some(missing) = roles.iter().find(|role| !matched.contains(role)) {
            return Err(PipelineError::InvalidConfig(format!(
                "trainable role '{missing}' matches no model parameter"
            )));
        }

        Ok(Self { params })
    }

    /// A builder that hands out the stored tensors themselves, so trainable
    /// vars in the model are the same vars the optimizer updates.
    pub fn var_builder(&self, device: &Device) -> VarBuilder<'static> {
        let tensors: HashMap<String, Tensor> = self
            .params
            .iter()
            .map(|(name, param)| (name.clone(), param.as_tensor().clone()))
            .collect();
        VarBuilder::from_tensors(tensors, DType::F32, device)
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.params.iter().map(|(name, param)| (name.as_str(), param))
    }

    pub fn trainable_vars(&self) -> Vec<Var> {
        self.params
            .values()
            .filter_map(|param| match param {
                Parameter::Trainable(var) => Some(var.clone()),
                Parameter::Frozen(_) => None,
            })
            .collect()
    }

    /// Scalar count across all parameters.
    pub fn parameter_count(&self) -> usize {
        self.params
            .values()
            .map(|p| p.as_tensor().elem_count())
            .sum()
    }

    pub fn trainable_parameter_count(&self) -> usize {
        self.params
            .values()
            .filter(|p| p.is_trainable())
            .map(|p| p.as_tensor().elem_count())
            .sum()
    }

    /// Serialized byte size of all parameters.
    pub fn size_in_bytes(&self) -> usize {
        self.params
            .values()
            .map(|p| {
                let t = p.as_tensor();
                t.elem_count() * t.dtype().size_in_bytes()
            })
            .sum()
    }

    /// Write every parameter, trainable and frozen, as safetensors.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tensors: HashMap<String, Tensor> = self
            .params
            .iter()
            .map(|(name, param)| (name.clone(), param.as_tensor().clone()))
            .collect();
        candle_core::safetensors::save(&tensors, path)?;
        Ok(())
    }
}

fn is_float(dtype: DType) -> bool {
    matches!(dtype, DType::F16 | DType::BF16 | DType::F32 | DType::F64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tensors() -> HashMap<String, Tensor> {
        let device = Device::Cpu;
        [
            "bert.encoder.layer.0.attention.self.query.weight",
            "bert.encoder.layer.0.attention.self.key.weight",
            "bert.encoder.layer.0.attention.self.value.weight",
            "classifier.weight",
        ]
        .into_iter()
        .map(|name| (name.to_string(), Tensor::ones((2, 2), DType::F32, &device).unwrap()))
        .collect()
    }

    #[test]
    fn role_matches_whole_segments_only() {
        let roles = TrainableRoles::new(["query"]);
        assert!(roles.matches("bert.encoder.layer.0.attention.self.query.weight"));
        assert!(!roles.matches("bert.encoder.layer.0.attention.self.query_proj.weight"));
        assert!(!TrainableRoles::none().matches("classifier.weight"));
    }

    #[test]
    fn partitions_by_role() {
        let store =
            ParameterStore::from_tensors(tensors(), &TrainableRoles::new(["query", "value"]))
                .unwrap();
        assert_eq!(store.trainable_vars().len(), 2);
        assert_eq!(store.trainable_parameter_count(), 8);
        assert_eq!(store.parameter_count(), 16);
        assert_eq!(store.size_in_bytes(), 64);
        assert!(!store.get("classifier.weight").unwrap().is_trainable());
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = ParameterStore::from_tensors(tensors(), &TrainableRoles::new(["dense"]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn var_builder_shares_trainable_storage() {
        let store =
            ParameterStore::from_tensors(tensors(), &TrainableRoles::new(["query"])).unwrap();
        let vb = store.var_builder(&Device::Cpu);
        let from_vb = vb
            .get((2, 2), "bert.encoder.layer.0.attention.self.query.weight")
            .unwrap();

        let var = store.trainable_vars().remove(0);
        var.set(&Tensor::zeros((2, 2), DType::F32, &Device::Cpu).unwrap())
            .unwrap();

        let seen = from_vb.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(seen, vec![0.0; 4]);
    }
}
