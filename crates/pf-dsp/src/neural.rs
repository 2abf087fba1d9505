//! Neural amp model inference
//!
//! Single-layer LSTM followed by a dense projection, evaluated one sample
//! at a time. Weights are parsed once from JSON into an immutable
//! `LstmModel` (shared as `Arc`), while each `LstmAmp` owns its recurrent
//! state and gate scratch so inference never allocates.
//!
//! Gate layout follows the common training convention: rows of the
//! stacked weight matrices are `[input, forget, cell, output]`.

use std::sync::Arc;

use pf_core::{PfError, PfResult, Sample};
use serde::{Deserialize, Serialize};

use crate::{MonoProcessor, Processor};

pub const MAX_HIDDEN_SIZE: usize = 128;
pub const MAX_INPUT_SIZE: usize = 4;

/// On-disk model description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmModelFile {
    #[serde(default)]
    pub name: String,
    /// Rate the model was trained at; 0 when unknown
    #[serde(default)]
    pub sample_rate: f64,
    pub input_size: usize,
    pub hidden_size: usize,
    /// `4·hidden × input`
    pub weight_ih: Vec<Vec<f64>>,
    /// `4·hidden × hidden`
    pub weight_hh: Vec<Vec<f64>>,
    /// `4·hidden` (input and recurrent biases already summed)
    pub bias: Vec<f64>,
    /// `hidden`
    pub dense_weight: Vec<f64>,
    #[serde(default)]
    pub dense_bias: f64,
    /// Add the dry input to the model output
    #[serde(default)]
    pub skip: bool,
}

/// Validated, flattened LSTM weights
#[derive(Debug, Clone, PartialEq)]
pub struct LstmModel {
    name: String,
    sample_rate: f64,
    input_size: usize,
    hidden_size: usize,
    weight_ih: Vec<f64>,
    weight_hh: Vec<f64>,
    bias: Vec<f64>,
    dense_weight: Vec<f64>,
    dense_bias: f64,
    skip: bool,
}

fn shape_error(what: &str, expected: usize, got: usize) -> PfError {
    PfError::InvalidParam(format!("{what}: expected {expected}, got {got}"))
}

fn flatten(rows: &[Vec<f64>], cols: usize, what: &str) -> PfResult<Vec<f64>> {
    let mut flat = Vec::with_capacity(rows.len() * cols);
    for row in rows {
        if row.len() != cols {
            return Err(shape_error(what, cols, row.len()));
        }
        flat.extend_from_slice(row);
    }
    Ok(flat)
}

impl LstmModel {
    /// Check every dimension and that all weights are finite.
    pub fn from_file(file: LstmModelFile) -> PfResult<Self> {
        let h = file.hidden_size;
        let i = file.input_size;
        if h == 0 || h > MAX_HIDDEN_SIZE {
            return Err(PfError::InvalidParam(format!("hidden_size {h} out of range")));
        }
        if i == 0 || i > MAX_INPUT_SIZE {
            return Err(PfError::InvalidParam(format!("input_size {i} out of range")));
        }
        if file.weight_ih.len() != 4 * h {
            return Err(shape_error("weight_ih rows", 4 * h, file.weight_ih.len()));
        }
        if file.weight_hh.len() != 4 * h {
            return Err(shape_error("weight_hh rows", 4 * h, file.weight_hh.len()));
        }
        if file.bias.len() != 4 * h {
            return Err(shape_error("bias", 4 * h, file.bias.len()));
        }
        if file.dense_weight.len() != h {
            return Err(shape_error("dense_weight", h, file.dense_weight.len()));
        }

        let weight_ih = flatten(&file.weight_ih, i, "weight_ih columns")?;
        let weight_hh = flatten(&file.weight_hh, h, "weight_hh columns")?;

        let all_finite = weight_ih
            .iter()
            .chain(&weight_hh)
            .chain(&file.bias)
            .chain(&file.dense_weight)
            .chain(std::iter::once(&file.dense_bias))
            .all(|w| w.is_finite());
        if !all_finite {
            return Err(PfError::InvalidParam("non-finite weight".into()));
        }

        Ok(Self {
            name: file.name,
            sample_rate: file.sample_rate,
            input_size: i,
            hidden_size: h,
            weight_ih,
            weight_hh,
            bias: file.bias,
            dense_weight: file.dense_weight,
            dense_bias: file.dense_bias,
            skip: file.skip,
        })
    }

    pub fn from_json_str(json: &str) -> PfResult<Self> {
        let file: LstmModelFile =
            serde_json::from_str(json).map_err(|e| PfError::Serialization(e.to_string()))?;
        Self::from_file(file)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }
}

#[inline(always)]
fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Per-instance inference state over a shared model
#[derive(Debug, Clone)]
pub struct LstmAmp {
    model: Arc<LstmModel>,
    hidden: Vec<f64>,
    cell: Vec<f64>,
    gates: Vec<f64>,
    input: [f64; MAX_INPUT_SIZE],
}

impl LstmAmp {
    pub fn new(model: Arc<LstmModel>) -> Self {
        let h = model.hidden_size;
        Self {
            model,
            hidden: vec![0.0; h],
            cell: vec![0.0; h],
            gates: vec![0.0; 4 * h],
            input: [0.0; MAX_INPUT_SIZE],
        }
    }

    pub fn model(&self) -> &Arc<LstmModel> {
        &self.model
    }

    /// Conditioning inputs after the audio sample (e.g. a gain knob),
    /// ignored beyond the model's input size.
    pub fn set_condition(&mut self, index: usize, value: f64) {
        let slot = index + 1;
        if slot < self.model.input_size && value.is_finite() {
            self.input[slot] = value;
        }
    }

    #[inline]
    fn step(&mut self, x: Sample) -> Sample {
        let m = &*self.model;
        let h = m.hidden_size;
        let n_in = m.input_size;
        self.input[0] = x;

        for (row, gate) in self.gates.iter_mut().enumerate() {
            let wi = &m.weight_ih[row * n_in..(row + 1) * n_in];
            let wh = &m.weight_hh[row * h..(row + 1) * h];
            let mut acc = m.bias[row];
            for (w, v) in wi.iter().zip(&self.input[..n_in]) {
                acc += w * v;
            }
            for (w, v) in wh.iter().zip(&self.hidden) {
                acc += w * v;
            }
            *gate = acc;
        }

        let mut out = m.dense_bias;
        for k in 0..h {
            let i_gate = sigmoid(self.gates[k]);
            let f_gate = sigmoid(self.gates[h + k]);
            let g_gate = self.gates[2 * h + k].tanh();
            let o_gate = sigmoid(self.gates[3 * h + k]);

            let c = f_gate * self.cell[k] + i_gate * g_gate;
            self.cell[k] = crate::flush_denormal(c);
            self.hidden[k] = o_gate * c.tanh();
            out += m.dense_weight[k] * self.hidden[k];
        }

        if m.skip { out + x } else { out }
    }
}

impl Processor for LstmAmp {
    fn reset(&mut self) {
        self.hidden.fill(0.0);
        self.cell.fill(0.0);
    }
}

impl MonoProcessor for LstmAmp {
    #[inline]
    fn process_sample(&mut self, input: Sample) -> Sample {
        let input = if input.is_finite() { input } else { 0.0 };
        self.step(input)
    }
}
