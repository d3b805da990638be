//! Small fully connected ReLU network with hand-written backprop and Adam.

use anyhow::{ensure, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

fn relu(x: f32) -> f32 {
    x.max(0.0)
}

fn relu_derivative(x: f32) -> f32 {
    if x > 0.0 { 1.0 } else { 0.0 }
}

/// One dense layer. `weights` is row-major: out_dim rows of in_dim inputs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub in_dim: usize,
    pub out_dim: usize,
    pub weights: Vec<f32>,
    pub biases: Vec<f32>,
}

impl Layer {
    fn zeros(in_dim: usize, out_dim: usize) -> Self {
        Self { in_dim, out_dim, weights: vec![0.0; in_dim * out_dim], biases: vec![0.0; out_dim] }
    }

    fn random(in_dim: usize, out_dim: usize, rng: &mut StdRng) -> Self {
        // He-uniform, suits ReLU
        let limit = (6.0 / in_dim as f32).sqrt();
        let weights = (0..in_dim * out_dim).map(|_| rng.gen_range(-limit..limit)).collect();
        Self { in_dim, out_dim, weights, biases: vec![0.0; out_dim] }
    }

    fn apply(&self, input: &[f32]) -> Vec<f32> {
        (0..self.out_dim)
            .map(|o| {
                let row = &self.weights[o * self.in_dim..(o + 1) * self.in_dim];
                self.biases[o] + row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>()
            })
            .collect()
    }

    fn params(&self) -> impl Iterator<Item = &f32> {
        self.weights.iter().chain(self.biases.iter())
    }

    fn params_mut(&mut self) -> impl Iterator<Item = &mut f32> {
        self.weights.iter_mut().chain(self.biases.iter_mut())
    }
}

/// Activations kept from a forward pass, needed by `backward`.
pub struct Trace {
    acts: Vec<Vec<f32>>, // input of every layer, then the output
    pre: Vec<Vec<f32>>,  // pre-activation of every layer
}

impl Trace {
    pub fn output(&self) -> &[f32] {
        &self.acts[self.acts.len() - 1]
    }
}

#[derive(Clone)]
pub struct Net {
    layers: Vec<Layer>,
    grads: Vec<Layer>,
    adam_m: Vec<Layer>,
    adam_v: Vec<Layer>,
    adam_t: i32,
}

impl Net {
    /// `sizes` = [inputs, hidden.., outputs]; at least two entries.
    pub fn new(sizes: &[usize], seed: u64) -> Result<Self> {
        ensure!(sizes.len() >= 2, "network needs an input and an output size");
        ensure!(sizes.iter().all(|&s| s > 0), "layer sizes must be positive: {:?}", sizes);
        let mut rng = StdRng::seed_from_u64(seed);
        let layers = sizes.windows(2).map(|w| Layer::random(w[0], w[1], &mut rng)).collect();
        Ok(Self::from_layers_unchecked(layers))
    }

    /// Rebuilds a network from saved layers, checking the shapes chain up.
    pub fn from_layers(layers: Vec<Layer>) -> Result<Self> {
        ensure!(!layers.is_empty(), "network has no layers");
        for (i, l) in layers.iter().enumerate() {
            ensure!(
                l.weights.len() == l.in_dim * l.out_dim && l.biases.len() == l.out_dim,
                "layer {} has inconsistent shape",
                i
            );
        }
        for pair in layers.windows(2) {
            ensure!(pair[0].out_dim == pair[1].in_dim, "layer sizes do not chain");
        }
        Ok(Self::from_layers_unchecked(layers))
    }

    fn from_layers_unchecked(layers: Vec<Layer>) -> Self {
        let zeros: Vec<Layer> = layers.iter().map(|l| Layer::zeros(l.in_dim, l.out_dim)).collect();
        Self { layers, grads: zeros.clone(), adam_m: zeros.clone(), adam_v: zeros, adam_t: 0 }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn input_dim(&self) -> usize {
        self.layers[0].in_dim
    }

    pub fn output_dim(&self) -> usize {
        self.layers[self.layers.len() - 1].out_dim
    }

    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        let last = self.layers.len() - 1;
        let mut a = input.to_vec();
        for (i, layer) in self.layers.iter().enumerate() {
            a = layer.apply(&a);
            if i < last {
                a.iter_mut().for_each(|v| *v = relu(*v));
            }
        }
        a
    }

    pub fn forward_trace(&self, input: &[f32]) -> Trace {
        let last = self.layers.len() - 1;
        let mut acts = vec![input.to_vec()];
        let mut pre = Vec::with_capacity(self.layers.len());
        for (i, layer) in self.layers.iter().enumerate() {
            let z = layer.apply(&acts[i]);
            let a = if i < last { z.iter().map(|&v| relu(v)).collect() } else { z.clone() };
            pre.push(z);
            acts.push(a);
        }
        Trace { acts, pre }
    }

    /// Accumulates parameter gradients for dLoss/dOutput = `d_out`.
    pub fn backward(&mut self, trace: &Trace, d_out: &[f32]) {
        let mut delta = d_out.to_vec();
        for i in (0..self.layers.len()).rev() {
            let layer = &self.layers[i];
            let grad = &mut self.grads[i];
            let a_in = &trace.acts[i];
            for o in 0..layer.out_dim {
                grad.biases[o] += delta[o];
                let row = &mut grad.weights[o * layer.in_dim..(o + 1) * layer.in_dim];
                for (g, x) in row.iter_mut().zip(a_in) {
                    *g += delta[o] * x;
                }
            }
            if i > 0 {
                let mut prev = vec![0.0f32; layer.in_dim];
                for o in 0..layer.out_dim {
                    let row = &layer.weights[o * layer.in_dim..(o + 1) * layer.in_dim];
                    for (p, w) in prev.iter_mut().zip(row) {
                        *p += w * delta[o];
                    }
                }
                for (p, z) in prev.iter_mut().zip(&trace.pre[i - 1]) {
                    *p *= relu_derivative(*z);
                }
                delta = prev;
            }
        }
    }

    pub fn zero_grad(&mut self) {
        for g in &mut self.grads {
            g.params_mut().for_each(|v| *v = 0.0);
        }
    }

    pub fn grad_l2_sum_all(&self) -> f32 {
        self.grads.iter().flat_map(|g| g.params()).map(|v| v * v).sum()
    }

    /// Scale factor that brings the global gradient norm down to `max_norm`.
    pub fn clip_grad_norm(&self, max_norm: f32) -> f32 {
        let norm = self.grad_l2_sum_all().sqrt();
        if norm > max_norm && norm > 0.0 { max_norm / norm } else { 1.0 }
    }

    pub fn step_adam(&mut self, lr: f32, beta1: f32, beta2: f32, eps: f32, grad_scale: f32) {
        self.adam_t += 1;
        let bc1 = 1.0 - beta1.powi(self.adam_t);
        let bc2 = 1.0 - beta2.powi(self.adam_t);
        for i in 0..self.layers.len() {
            let params = self.layers[i].params_mut();
            let grads = self.grads[i].params();
            let ms = self.adam_m[i].params_mut();
            let vs = self.adam_v[i].params_mut();
            for (((p, g), m), v) in params.zip(grads).zip(ms).zip(vs) {
                let g = g * grad_scale;
                *m = beta1 * *m + (1.0 - beta1) * g;
                *v = beta2 * *v + (1.0 - beta2) * g * g;
                let m_hat = *m / bc1;
                let v_hat = *v / bc2;
                *p -= lr * m_hat / (v_hat.sqrt() + eps);
            }
        }
    }

    /// target <- tau * online + (1 - tau) * target
    pub fn soft_update_from(&mut self, online: &Net, tau: f32) {
        for (dst, src) in self.layers.iter_mut().zip(&online.layers) {
            for (d, s) in dst.params_mut().zip(src.params()) {
                *d = tau * s + (1.0 - tau) * *d;
            }
        }
    }

    pub fn copy_from(&mut self, other: &Net) {
        self.layers = other.layers.clone();
    }

    pub fn non_finite_any(&self) -> bool {
        self.layers.iter().flat_map(|l| l.params()).any(|v| !v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes() {
        let net = Net::new(&[11, 8, 8, 4], 1).unwrap();
        assert_eq!(net.input_dim(), 11);
        assert_eq!(net.output_dim(), 4);
        assert_eq!(net.forward(&[0.5; 11]).len(), 4);
        assert!(Net::new(&[4], 1).is_err());
        assert!(Net::new(&[4, 0, 2], 1).is_err());
    }

    #[test]
    fn test_trace_matches_forward() {
        let net = Net::new(&[3, 5, 2], 7).unwrap();
        let x = [0.2, -0.4, 1.0];
        assert_eq!(net.forward_trace(&x).output(), net.forward(&x).as_slice());
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let mut net = Net::new(&[3, 4, 2], 3).unwrap();
        let x = [0.3, -0.7, 0.9];
        // loss = out[1]
        let trace = net.forward_trace(&x);
        net.backward(&trace, &[0.0, 1.0]);

        let h = 1e-3;
        for idx in [0usize, 5, 11] {
            let mut plus = net.clone();
            plus.layers[0].weights[idx] += h;
            let mut minus = net.clone();
            minus.layers[0].weights[idx] -= h;
            let numeric = (plus.forward(&x)[1] - minus.forward(&x)[1]) / (2.0 * h);
            let analytic = net.grads[0].weights[idx];
            assert!((numeric - analytic).abs() < 1e-2, "idx {idx}: {numeric} vs {analytic}");
        }
    }

    #[test]
    fn test_adam_reduces_regression_loss() {
        let mut net = Net::new(&[2, 8, 1], 5).unwrap();
        let data = [([0.0, 1.0], 1.0f32), ([1.0, 0.0], -1.0), ([1.0, 1.0], 0.0)];
        let loss = |n: &Net| data.iter().map(|(x, y)| (n.forward(x)[0] - y).powi(2)).sum::<f32>();
        let before = loss(&net);
        for _ in 0..300 {
            net.zero_grad();
            for (x, y) in &data {
                let trace = net.forward_trace(x);
                let e = trace.output()[0] - y;
                net.backward(&trace, &[2.0 * e]);
            }
            let scale = net.clip_grad_norm(10.0);
            net.step_adam(0.01, 0.9, 0.999, 1e-8, scale);
        }
        assert!(loss(&net) < before * 0.5);
    }

    #[test]
    fn test_soft_update_and_copy() {
        let online = Net::new(&[2, 3, 1], 1).unwrap();
        let mut target = Net::new(&[2, 3, 1], 2).unwrap();
        let before = target.layers()[0].weights[0];
        target.soft_update_from(&online, 0.5);
        let expected = 0.5 * online.layers()[0].weights[0] + 0.5 * before;
        assert!((target.layers()[0].weights[0] - expected).abs() < 1e-6);

        target.copy_from(&online);
        assert_eq!(target.layers(), online.layers());
    }

    #[test]
    fn test_from_layers_checks_shapes() {
        let net = Net::new(&[2, 3, 1], 1).unwrap();
        assert!(Net::from_layers(net.layers().to_vec()).is_ok());

        let mut broken = net.layers().to_vec();
        broken[1].in_dim = 4;
        assert!(Net::from_layers(broken).is_err());
        assert!(Net::from_layers(Vec::new()).is_err());
    }

    #[test]
    fn test_clip_scale() {
        let mut net = Net::new(&[1, 1], 1).unwrap();
        let trace = net.forward_trace(&[1.0]);
        net.backward(&trace, &[10.0]);
        // grads: weight 10, bias 10 -> norm sqrt(200)
        let s = net.clip_grad_norm(1.0);
        assert!((s - 1.0 / 200f32.sqrt()).abs() < 1e-5);
        net.zero_grad();
        assert_eq!(net.grad_l2_sum_all(), 0.0);
        assert_eq!(net.clip_grad_norm(1.0), 1.0);
    }
}
