//! Sigmoid feed-forward network with online backpropagation.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;

/// 初期重みの範囲 [-INIT_RANGE, INIT_RANGE)
const INIT_RANGE: f32 = 0.2;

fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

#[derive(Debug, Clone, PartialEq)]
struct Layer {
    /// (出力数, 入力数)
    weights: Array2<f32>,
    biases: Array1<f32>,
}

impl Layer {
    fn random<R: Rng>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        let weights = Array2::from_shape_fn((outputs, inputs), |_| rng.gen_range(-INIT_RANGE..INIT_RANGE));
        let biases = Array1::from_shape_fn(outputs, |_| rng.gen_range(-INIT_RANGE..INIT_RANGE));
        Self { weights, biases }
    }

    fn forward(&self, input: ArrayView1<f32>) -> Array1<f32> {
        (self.weights.dot(&input) + &self.biases).mapv(sigmoid)
    }
}

/// 全結合・シグモイドのネットワーク。推論は `&self` のみ
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    layers: Vec<Layer>,
}

impl Network {
    /// `sizes` = [入力, 隠れ..., 出力]
    pub fn random<R: Rng>(sizes: &[usize], rng: &mut R) -> Self {
        let layers = sizes
            .windows(2)
            .map(|w| Layer::random(w[0], w[1], &mut *rng))
            .collect();
        Self { layers }
    }

    #[cfg(test)]
    fn input_size(&self) -> usize {
        self.layers.first().map_or(0, |l| l.weights.ncols())
    }

    #[cfg(test)]
    fn output_size(&self) -> usize {
        self.layers.last().map_or(0, |l| l.weights.nrows())
    }

    pub fn run(&self, input: ArrayView1<f32>) -> Array1<f32> {
        let mut activation = input.to_owned();
        for layer in &self.layers {
            activation = layer.forward(activation.view());
        }
        activation
    }

    /// 入力を含む各層の出力
    fn activations(&self, input: ArrayView1<f32>) -> Vec<Array1<f32>> {
        let mut out = Vec::with_capacity(self.layers.len() + 1);
        out.push(input.to_owned());
        for layer in &self.layers {
            let next = layer.forward(out[out.len() - 1].view());
            out.push(next);
        }
        out
    }
}

/// 学習中だけ存在する状態（モーメンタム用の前回更新量）
pub struct Trainer {
    network: Network,
    changes: Vec<Array2<f32>>,
    learning_rate: f32,
    momentum: f32,
}

impl Trainer {
    pub fn new(network: Network, learning_rate: f32, momentum: f32) -> Self {
        let changes = network
            .layers
            .iter()
            .map(|l| Array2::zeros(l.weights.raw_dim()))
            .collect();
        Self {
            network,
            changes,
            learning_rate,
            momentum,
        }
    }

    /// 1サンプル分の逆伝播。更新前の出力に対する平均二乗誤差を返す
    pub fn train_sample(&mut self, input: ArrayView1<f32>, target: ArrayView1<f32>) -> f32 {
        let activations = self.network.activations(input);
        let layer_count = self.network.layers.len();

        let output = &activations[layer_count];
        let error = &target - output;
        let mse = error.mapv(|e| e * e).mean().unwrap_or(0.0);

        // 先に全層のデルタを求めてから重みを更新する
        let mut deltas: Vec<Array1<f32>> = vec![Array1::zeros(0); layer_count];
        deltas[layer_count - 1] = &error * &output.mapv(|o| o * (1.0 - o));
        for l in (1..layer_count).rev() {
            let back = self.network.layers[l].weights.t().dot(&deltas[l]);
            let out = &activations[l];
            deltas[l - 1] = back * &out.mapv(|o| o * (1.0 - o));
        }

        for (l, delta) in deltas.iter().enumerate() {
            let incoming = activations[l].view().insert_axis(Axis(0));
            let gradient = delta.view().insert_axis(Axis(1)).dot(&incoming);
            let change = gradient * self.learning_rate + &(&self.changes[l] * self.momentum);

            let layer = &mut self.network.layers[l];
            layer.weights += &change;
            layer.biases.scaled_add(self.learning_rate, delta);
            self.changes[l] = change;
        }

        mse
    }

    pub fn into_network(self) -> Network {
        self.network
    }
}
