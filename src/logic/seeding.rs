//! Standard tournament seeding: top seeds meet as late as possible.

/// Seed order for a bracket of `n` players (`n` a power of two, at least 2).
///
/// Built by doubling: each seed `s` is followed by its complement
/// `size + 1 - s`, so consecutive pairs give (1, n), (n/2, n/2 + 1), ... and
/// seeds 1 and 2 land in opposite halves of the bracket.
pub fn seed_order(n: u32) -> Vec<u32> {
    let mut order = vec![1u32];
    let mut size = 1u32;
    while size < n {
        size *= 2;
        let mut next = Vec::with_capacity(size as usize);
        for &s in &order {
            next.push(s);
            next.push(size + 1 - s);
        }
        order = next;
    }
    order
}

/// First-round pairings as zero-based indices into the entrant list
/// (index = seed - 1). Match `i` pairs `seeds[2i]` against `seeds[2i+1]`.
pub fn first_round_pairs(n: u32) -> Vec<(usize, usize)> {
    seed_order(n)
        .chunks(2)
        .map(|pair| ((pair[0] - 1) as usize, (pair[1] - 1) as usize))
        .collect()
}
