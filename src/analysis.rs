//! Pure functions over recorded spike timestamps: per-neuron spike counts
//! in a time window and per class group spiking/non-spiking breakdown.
//!
//! Class groups are contiguous blocks of `class_size` neurons in the flat
//! spike count list: member `i` of group `class_id` sits at index
//! `class_id * class_size + i`. Callers whose neuron ids are assigned
//! differently must remap before calling in here.

use crate::spike_record::SpikeRecord;

/// Number of spikes per neuron with a timestamp in `[start, end]`,
/// inclusive on both ends.
pub fn count_spikes(spike_record: &SpikeRecord, start: f64, end: f64) -> Vec<usize> {
    (0..spike_record.num_neurons())
        .map(|neuron_id| {
            spike_record
                .times(neuron_id)
                .iter()
                .filter(|&&t| start <= t && t <= end)
                .count()
        })
        .collect()
}

/// Number of spiking members (non-zero spike count) per class group.
///
/// `spike_counts` must hold at least `class_size * class_amount` entries.
pub fn class_spike_counts(
    spike_counts: &[usize],
    class_size: usize,
    class_amount: usize,
) -> Vec<usize> {
    assert_class_partition(spike_counts, class_size, class_amount);

    (0..class_amount)
        .map(|class_id| {
            (0..class_size)
                .filter(|i| spike_counts[class_id * class_size + i] > 0)
                .count()
        })
        .collect()
}

/// Per class group, the member indices (relative to the group) with
/// non-zero vs zero spike count, in discovery order.
///
/// `spike_counts` must hold at least `class_size * class_amount` entries.
pub fn classify_spiking_ids(
    spike_counts: &[usize],
    class_size: usize,
    class_amount: usize,
) -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
    assert_class_partition(spike_counts, class_size, class_amount);

    let mut spiking = Vec::with_capacity(class_amount);
    let mut non_spiking = Vec::with_capacity(class_amount);

    for class_id in 0..class_amount {
        let mut spiking_members = Vec::new();
        let mut non_spiking_members = Vec::new();

        for i in 0..class_size {
            if spike_counts[class_id * class_size + i] > 0 {
                spiking_members.push(i);
            } else {
                non_spiking_members.push(i);
            }
        }

        spiking.push(spiking_members);
        non_spiking.push(non_spiking_members);
    }

    (spiking, non_spiking)
}

fn assert_class_partition(spike_counts: &[usize], class_size: usize, class_amount: usize) {
    assert!(
        class_size * class_amount <= spike_counts.len(),
        "class partition exceeds population: {} * {} > {}",
        class_size,
        class_amount,
        spike_counts.len()
    );
}
