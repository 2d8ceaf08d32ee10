//! Pure packet-by-packet GPS finish-time computation (§4.2).
//!
//! Given one user's packets in arrival order, assigns finish times
//! sequentially: `finish = max(last_finish, arrival) + length / weight`.
//! This never touches the store or the clock — [`super::Scheduler`] is
//! responsible for fetching the arrival-ordered slice, resolving each
//! packet's length, calling this, and writing the results back.

/// One packet's inputs/outputs for the recomputation, decoupled from the
/// storage-layer `Packet` type so this function stays a pure computation
/// over plain data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketTiming {
    pub arrival_time: f64,
    pub length: f64,
    pub weight: f64,
    pub finish_time: f64,
}

/// Recomputes `finish_time` in place for packets already sorted by
/// `arrival_time` ascending, all belonging to the same user.
pub fn recompute(packets: &mut [PacketTiming]) {
    let mut last_finish: Option<f64> = None;

    for packet in packets.iter_mut() {
        let base = match last_finish {
            Some(last) => last.max(packet.arrival_time),
            None => packet.arrival_time,
        };
        packet.finish_time = base + packet.length / packet.weight;
        last_finish = Some(packet.finish_time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing(arrival: f64, length: f64, weight: f64) -> PacketTiming {
        PacketTiming {
            arrival_time: arrival,
            length,
            weight,
            finish_time: 0.0,
        }
    }

    #[test]
    fn s1_round_robin_unit_lengths() {
        // Two users served independently; this tests one user's chain:
        // arrival 0, length 10, weight 1 -> finish 10; a second packet for
        // the same user arriving at 10 (already past the first's finish)
        // finishes at 20.
        let mut packets = [timing(0.0, 10.0, 1.0), timing(10.0, 10.0, 1.0)];
        recompute(&mut packets);
        assert_eq!(packets[0].finish_time, 10.0);
        assert_eq!(packets[1].finish_time, 20.0);
    }

    #[test]
    fn s2_votes_accelerate_only_voted_packet_but_cascade_downstream() {
        // u1 queues A (length 10) then C (length 10), both arriving at 0.
        // Before any extra vote: A.finish=10, C.finish=20.
        let mut packets = [timing(0.0, 10.0, 1.0), timing(0.0, 10.0, 1.0)];
        recompute(&mut packets);
        assert_eq!(packets[0].finish_time, 10.0);
        assert_eq!(packets[1].finish_time, 20.0);

        // Two extra votes land on A: weight(A) = 3. A.finish = 10/3, and C
        // (still weight 1) cascades off A's new, earlier finish time.
        packets[0].weight = 3.0;
        recompute(&mut packets);
        assert!((packets[0].finish_time - 10.0 / 3.0).abs() < 1e-9);
        assert!((packets[1].finish_time - (10.0 / 3.0 + 10.0)).abs() < 1e-9);
    }

    #[test]
    fn arrival_after_previous_finish_resets_base_to_arrival() {
        // A packet arriving well after the previous one finished should not
        // inherit a stale `last_finish` base.
        let mut packets = [timing(0.0, 5.0, 1.0), timing(100.0, 5.0, 1.0)];
        recompute(&mut packets);
        assert_eq!(packets[0].finish_time, 5.0);
        assert_eq!(packets[1].finish_time, 105.0);
    }

    #[test]
    fn invariant_finish_time_at_least_arrival_plus_length_over_weight() {
        let mut packets = [timing(3.0, 7.0, 2.0)];
        recompute(&mut packets);
        assert!(packets[0].finish_time >= packets[0].arrival_time + 7.0 / 2.0 - 1e-9);
    }
}
