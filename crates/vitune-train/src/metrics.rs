//! Classification accuracy over logit batches

use aprender::autograd::Tensor;

/// Top-1 and top-5 accuracy of `output` (`[batch, classes]` logits) against
/// `target` (`[batch]` class indices), as percentages in [0, 100]
pub fn accuracy(output: &Tensor, target: &Tensor) -> (f32, f32) {
    let shape = output.shape();
    let (batch, classes) = (shape[0], shape[1]);
    let logits = output.data();
    let labels = target.data();

    let mut correct1 = 0usize;
    let mut correct5 = 0usize;

    for b in 0..batch {
        let row = &logits[b * classes..(b + 1) * classes];
        let label = labels[b] as usize;
        let label_score = row[label];
        // Rank = number of classes scored strictly above the true label
        let rank = row.iter().filter(|&&score| score > label_score).count();
        if rank < 1 {
            correct1 += 1;
        }
        if rank < 5 {
            correct5 += 1;
        }
    }

    (
        100.0 * correct1 as f32 / batch as f32,
        100.0 * correct5 as f32 / batch as f32,
    )
}
