use std::collections::BTreeMap;

use crate::columns::{Column, HeapColumn, SetColumn};
use crate::fields::{FieldOperators, MultiField, PrimeField, Z2, Z2One};
use crate::matrices::chain::ChainMatrix;
use crate::matrices::overlay::IdOverlay;
use crate::matrices::ru::RuMatrix;
use crate::matrices::Bar;
use crate::{RowIndex, VineaError};

/// A filled triangle: three vertices, three edges, one 2-face.
fn triangle_boundaries() -> Vec<Vec<(RowIndex, i64)>> {
    vec![
        vec![],
        vec![],
        vec![],
        vec![(0, -1), (1, 1)],
        vec![(0, -1), (2, 1)],
        vec![(1, -1), (2, 1)],
        vec![(3, 1), (4, -1), (5, 1)],
    ]
}

fn triangle_bars() -> Vec<Bar> {
    vec![
        Bar { dimension: 0, birth: 0, death: None },
        Bar { dimension: 0, birth: 1, death: Some(3) },
        Bar { dimension: 0, birth: 2, death: Some(4) },
        Bar { dimension: 1, birth: 5, death: Some(6) },
    ]
}

fn ru_triangle<F: FieldOperators>(ops: F) -> RuMatrix<F> {
    let mut matrix = RuMatrix::new(ops);
    for boundary in triangle_boundaries() {
        matrix.insert_boundary(&boundary).unwrap();
    }
    matrix
}

fn chain_triangle<F: FieldOperators>(ops: F) -> ChainMatrix<F> {
    let mut matrix = ChainMatrix::new(ops);
    for boundary in triangle_boundaries() {
        matrix.insert_boundary(&boundary).unwrap();
    }
    matrix
}

fn rows_of<F: FieldOperators, C: Column<F>>(ops: &F, col: &C) -> Vec<RowIndex> {
    col.entries(ops).iter().map(|e| e.row).collect()
}

#[test]
fn test_ru_triangle_barcode() {
    let matrix = ru_triangle(Z2);
    assert_eq!(matrix.barcode(), triangle_bars());
    assert_eq!(matrix.max_dimension(), Some(2));
    assert_eq!(matrix.dimension(3).unwrap(), 1);
    // edge 3 kills vertex 1, so column 3 owns pivot 1
    assert_eq!(matrix.column_with_pivot(1), Some(3));
    assert_eq!(matrix.get_pivot(3).unwrap(), Some(1));
    assert_eq!(matrix.column_with_pivot(5), Some(6));
    assert_eq!(matrix.column_with_pivot(0), None);
}

#[test]
fn test_ru_triangle_barcode_mod_5() {
    let matrix = ru_triangle(PrimeField::new(5).unwrap());
    assert_eq!(matrix.barcode(), triangle_bars());
}

#[test]
fn test_ru_triangle_barcode_multi_field() {
    let matrix = ru_triangle(MultiField::new(2, 5).unwrap());
    assert_eq!(matrix.barcode(), triangle_bars());
}

#[test]
fn test_ru_triangle_other_columns() {
    let mut set_matrix: RuMatrix<Z2, SetColumn<Z2One>> = RuMatrix::new(Z2);
    let mut heap_matrix: RuMatrix<Z2, HeapColumn<Z2One>> = RuMatrix::new(Z2);
    for boundary in triangle_boundaries() {
        set_matrix.insert_boundary(&boundary).unwrap();
        heap_matrix.insert_boundary(&boundary).unwrap();
    }
    assert_eq!(set_matrix.barcode(), triangle_bars());
    assert_eq!(heap_matrix.barcode(), triangle_bars());
}

#[test]
fn test_ru_decomposition_holds() {
    let ops = PrimeField::new(7).unwrap();
    let boundaries = triangle_boundaries();
    let matrix = ru_triangle(ops);
    for pos in 0..matrix.len() {
        // R[.][pos] must equal the U[.][pos]-combination of boundary columns
        let mut acc: BTreeMap<RowIndex, <PrimeField as FieldOperators>::Element> =
            BTreeMap::new();
        for u_entry in matrix.get_column_u(pos).unwrap().entries(&ops) {
            for &(row, value) in &boundaries[u_entry.row] {
                let Some(coeff) = ops.from_value(value) else { continue };
                let Some(scaled) = ops.mul(coeff, u_entry.coeff) else { continue };
                match acc.remove(&row) {
                    None => {
                        acc.insert(row, scaled);
                    }
                    Some(existing) => {
                        if let Some(sum) = ops.add(existing, scaled) {
                            acc.insert(row, sum);
                        }
                    }
                }
            }
        }
        let r_entries: BTreeMap<_, _> = matrix
            .get_column(pos)
            .unwrap()
            .entries(&ops)
            .into_iter()
            .map(|e| (e.row, e.coeff))
            .collect();
        assert_eq!(acc, r_entries, "decomposition broken at position {pos}");
    }
}

#[test]
fn test_ru_vine_swap_round_trip() {
    let mut matrix = ru_triangle(Z2);
    // the two edges at positions 3 and 4 do not interact
    matrix.vine_swap(3).unwrap();
    assert_eq!(
        matrix.barcode(),
        vec![
            Bar { dimension: 0, birth: 0, death: None },
            Bar { dimension: 0, birth: 1, death: Some(4) },
            Bar { dimension: 0, birth: 2, death: Some(3) },
            Bar { dimension: 1, birth: 5, death: Some(6) },
        ]
    );
    matrix.vine_swap(3).unwrap();
    assert_eq!(matrix.barcode(), triangle_bars());
}

#[test]
fn test_ru_vine_swap_parallel_edges() {
    // two edges on the same vertex pair: the death and the cycle birth
    // interact, so transposing them leaves the barcode untouched
    let mut matrix: RuMatrix<Z2> = RuMatrix::new(Z2);
    matrix.insert_boundary(&[]).unwrap();
    matrix.insert_boundary(&[]).unwrap();
    matrix.insert_boundary(&[(0, -1), (1, 1)]).unwrap();
    matrix.insert_boundary(&[(0, -1), (1, 1)]).unwrap();
    let expected = vec![
        Bar { dimension: 0, birth: 0, death: None },
        Bar { dimension: 0, birth: 1, death: Some(2) },
        Bar { dimension: 1, birth: 3, death: None },
    ];
    assert_eq!(matrix.barcode(), expected);
    matrix.vine_swap(2).unwrap();
    assert_eq!(matrix.barcode(), expected);
    assert!(!matrix.is_zero_column(2).unwrap());
    assert!(matrix.is_zero_column(3).unwrap());
    matrix.vine_swap(2).unwrap();
    assert_eq!(matrix.barcode(), expected);
}

#[test]
fn test_ru_get_row_after_vine_swap() {
    let mut matrix = ru_triangle(Z2);
    assert_eq!(matrix.get_row(1).unwrap(), vec![(3, Z2One)]);
    // edges 3 and 4 trade positions, so their vertex rows trade owners
    matrix.vine_swap(3).unwrap();
    assert_eq!(matrix.get_row(1).unwrap(), vec![(4, Z2One)]);
    assert_eq!(matrix.get_row(2).unwrap(), vec![(3, Z2One)]);
    assert_eq!(
        matrix.get_row(0).unwrap().iter().map(|&(c, _)| c).collect::<Vec<_>>(),
        vec![3, 4]
    );
    assert_eq!(matrix.get_row(3).unwrap(), vec![(6, Z2One)]);
}

#[test]
fn test_ru_remove_last_reopens_bar() {
    let mut matrix = ru_triangle(Z2);
    matrix.remove_last().unwrap();
    assert_eq!(
        matrix.barcode(),
        vec![
            Bar { dimension: 0, birth: 0, death: None },
            Bar { dimension: 0, birth: 1, death: Some(3) },
            Bar { dimension: 0, birth: 2, death: Some(4) },
            Bar { dimension: 1, birth: 5, death: None },
        ]
    );
}

#[test]
fn test_ru_representative_cycles() {
    let mut matrix = ru_triangle(Z2);
    matrix.update_representative_cycles();
    let loop_bar = Bar { dimension: 1, birth: 5, death: Some(6) };
    let cycle = matrix.representative_cycle(&loop_bar).unwrap();
    assert_eq!(cycle.iter().map(|e| e.row).collect::<Vec<_>>(), vec![3, 4, 5]);
    let vertex_bar = Bar { dimension: 0, birth: 0, death: None };
    let cycle = matrix.representative_cycle(&vertex_bar).unwrap();
    assert_eq!(cycle.iter().map(|e| e.row).collect::<Vec<_>>(), vec![0]);
    // one cycle per birth position, in birth order
    let cycles = matrix.representative_cycles();
    assert_eq!(cycles.len(), 4);
    assert_eq!(cycles[0].iter().map(|e| e.row).collect::<Vec<_>>(), vec![0]);
    assert_eq!(cycles[3].iter().map(|e| e.row).collect::<Vec<_>>(), vec![3, 4, 5]);
}

#[test]
fn test_ru_reduction_is_deterministic() {
    let first = ru_triangle(Z2);
    let second = ru_triangle(Z2);
    assert_eq!(first.barcode(), second.barcode());
    for pos in 0..first.len() {
        assert!(first
            .get_column(pos)
            .unwrap()
            .eq_column(&Z2, second.get_column(pos).unwrap()));
        assert!(first
            .get_column_u(pos)
            .unwrap()
            .eq_column(&Z2, second.get_column_u(pos).unwrap()));
    }
}

#[test]
fn test_chain_triangle_barcode() {
    let matrix = chain_triangle(Z2);
    assert_eq!(matrix.barcode(), triangle_bars());
    assert_eq!(matrix.max_dimension(), Some(2));
    assert_eq!(matrix.dimension(6).unwrap(), 2);
}

#[test]
fn test_chain_triangle_barcode_mod_5() {
    let matrix = chain_triangle(PrimeField::new(5).unwrap());
    assert_eq!(matrix.barcode(), triangle_bars());
}

#[test]
fn test_chain_triangle_columns() {
    let matrix = chain_triangle(Z2);
    // the essential vertex stays a bare chain, the loop is a full cycle
    assert_eq!(rows_of(&Z2, matrix.get_column(0).unwrap()), vec![0]);
    assert_eq!(rows_of(&Z2, matrix.get_column(5).unwrap()), vec![3, 4, 5]);
    assert!(matrix.is_paired(5).unwrap());
    assert!(!matrix.is_paired(0).unwrap());
}

#[test]
fn test_chain_representative_cycles() {
    let mut matrix = chain_triangle(Z2);
    matrix.update_representative_cycles();
    let loop_bar = Bar { dimension: 1, birth: 5, death: Some(6) };
    let cycle = matrix.representative_cycle(&loop_bar).unwrap();
    assert_eq!(cycle.iter().map(|e| e.row).collect::<Vec<_>>(), vec![3, 4, 5]);
    let merged_bar = Bar { dimension: 0, birth: 1, death: Some(3) };
    let cycle = matrix.representative_cycle(&merged_bar).unwrap();
    assert_eq!(cycle.iter().map(|e| e.row).collect::<Vec<_>>(), vec![0, 1]);
    let cycles = matrix.representative_cycles();
    assert_eq!(cycles.len(), 4);
    assert_eq!(cycles[1].iter().map(|e| e.row).collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(cycles[3].iter().map(|e| e.row).collect::<Vec<_>>(), vec![3, 4, 5]);
}

#[test]
fn test_chain_vine_swap_independent_round_trip() {
    let mut matrix = chain_triangle(Z2);
    // the chains of the edges 3 and 4 do not interact
    assert_eq!(matrix.vine_swap(3, 4).unwrap(), 3);
    assert_eq!(matrix.position_of(3).unwrap(), 4);
    assert_eq!(matrix.position_of(4).unwrap(), 3);
    assert_eq!(
        matrix.barcode(),
        vec![
            Bar { dimension: 0, birth: 0, death: None },
            Bar { dimension: 0, birth: 1, death: Some(4) },
            Bar { dimension: 0, birth: 2, death: Some(3) },
            Bar { dimension: 1, birth: 5, death: Some(6) },
        ]
    );
    assert_eq!(matrix.vine_swap(3, 4).unwrap(), 4);
    assert_eq!(matrix.barcode(), triangle_bars());
}

#[test]
fn test_chain_vine_swap_dependent_round_trip() {
    let mut matrix = chain_triangle(Z2);
    // the cycle of edge 5 contains edge 4: pivots trade chains, bars stay
    assert_eq!(matrix.vine_swap(4, 5).unwrap(), 4);
    assert_eq!(matrix.barcode(), triangle_bars());
    assert_eq!(matrix.position_of(4).unwrap(), 5);
    assert_eq!(rows_of(&Z2, matrix.get_column(4).unwrap()), vec![3, 4, 5]);
    assert_eq!(rows_of(&Z2, matrix.get_column(5).unwrap()), vec![3, 5]);
    assert_eq!(matrix.vine_swap(4, 5).unwrap(), 5);
    assert_eq!(matrix.barcode(), triangle_bars());
    assert_eq!(rows_of(&Z2, matrix.get_column(4).unwrap()), vec![4]);
}

#[test]
fn test_chain_vine_swap_parallel_edges() {
    let mut matrix: ChainMatrix<Z2> = ChainMatrix::new(Z2);
    matrix.insert_boundary(&[]).unwrap();
    matrix.insert_boundary(&[]).unwrap();
    matrix.insert_boundary(&[(0, -1), (1, 1)]).unwrap();
    matrix.insert_boundary(&[(0, -1), (1, 1)]).unwrap();
    let expected = vec![
        Bar { dimension: 0, birth: 0, death: None },
        Bar { dimension: 0, birth: 1, death: Some(2) },
        Bar { dimension: 1, birth: 3, death: None },
    ];
    assert_eq!(matrix.barcode(), expected);
    assert_eq!(matrix.vine_swap(2, 3).unwrap(), 2);
    assert_eq!(matrix.barcode(), expected);
    assert_eq!(rows_of(&Z2, matrix.get_column(2).unwrap()), vec![2, 3]);
    assert_eq!(rows_of(&Z2, matrix.get_column(3).unwrap()), vec![3]);
    assert_eq!(matrix.vine_swap(2, 3).unwrap(), 3);
    assert_eq!(matrix.barcode(), expected);
    assert_eq!(rows_of(&Z2, matrix.get_column(2).unwrap()), vec![2]);
}

#[test]
fn test_chain_remove_maximal_faces() {
    let mut matrix = chain_triangle(Z2);
    matrix.remove_maximal_face(6).unwrap();
    assert_eq!(
        matrix.barcode(),
        vec![
            Bar { dimension: 0, birth: 0, death: None },
            Bar { dimension: 0, birth: 1, death: Some(3) },
            Bar { dimension: 0, birth: 2, death: Some(4) },
            Bar { dimension: 1, birth: 5, death: None },
        ]
    );
    matrix.remove_maximal_face(5).unwrap();
    assert_eq!(matrix.len(), 5);
    assert_eq!(matrix.max_dimension(), Some(1));
    // removing edge 3 vines it past edge 4 first
    matrix.remove_maximal_face(3).unwrap();
    assert_eq!(
        matrix.barcode(),
        vec![
            Bar { dimension: 0, birth: 0, death: None },
            Bar { dimension: 0, birth: 1, death: None },
            Bar { dimension: 0, birth: 2, death: Some(3) },
        ]
    );
}

#[test]
fn test_chain_rejects_reused_id() {
    let mut matrix = chain_triangle(Z2);
    let err = matrix.insert_boundary_with_id(3, &[]).unwrap_err();
    assert!(matches!(err, VineaError::DuplicateId(3)));
}

#[test]
fn test_chain_rejects_non_adjacent_swap() {
    let mut matrix = chain_triangle(Z2);
    let err = matrix.vine_swap(3, 5).unwrap_err();
    assert!(matches!(err, VineaError::NonAdjacentSwap(3, 5)));
}

#[test]
fn test_overlay_triangle() {
    let mut matrix: IdOverlay<Z2> = IdOverlay::new(Z2);
    for boundary in triangle_boundaries() {
        matrix.insert_boundary(&boundary).unwrap();
    }
    assert_eq!(matrix.barcode(), triangle_bars());
    assert_eq!(matrix.vine_swap(3, 4).unwrap(), 3);
    assert_eq!(matrix.position_of(3).unwrap(), 4);
    assert_eq!(matrix.vine_swap(4, 3).unwrap(), 4);
    assert_eq!(matrix.barcode(), triangle_bars());
    matrix.remove_maximal_face(6).unwrap();
    matrix.remove_maximal_face(5).unwrap();
    assert_eq!(matrix.len(), 5);
    assert_eq!(
        matrix.barcode(),
        vec![
            Bar { dimension: 0, birth: 0, death: None },
            Bar { dimension: 0, birth: 1, death: Some(3) },
            Bar { dimension: 0, birth: 2, death: Some(4) },
        ]
    );
}

#[test]
fn test_overlay_sparse_ids() {
    let mut matrix: IdOverlay<Z2> = IdOverlay::new(Z2);
    matrix.insert_boundary_with_id(10, &[]).unwrap();
    matrix.insert_boundary_with_id(11, &[]).unwrap();
    matrix.insert_boundary_with_id(20, &[(10, -1), (11, 1)]).unwrap();
    assert_eq!(matrix.position_of(20).unwrap(), 2);
    assert_eq!(matrix.id_at_position(0).unwrap(), 10);
    assert_eq!(
        matrix.barcode(),
        vec![
            Bar { dimension: 0, birth: 0, death: None },
            Bar { dimension: 0, birth: 1, death: Some(2) },
        ]
    );
    let err = matrix.insert_boundary_with_id(11, &[]).unwrap_err();
    assert!(matches!(err, VineaError::DuplicateId(11)));
}

#[test]
fn test_overlay_removal_keeps_ids_stable() {
    let mut matrix: IdOverlay<Z2> = IdOverlay::new(Z2);
    for boundary in triangle_boundaries() {
        matrix.insert_boundary(&boundary).unwrap();
    }
    matrix.remove_maximal_face(6).unwrap();
    // edge 3 vines past 4 and 5 on its way out; without it, edge 5 turns
    // from a cycle birth into the death of the class born at position 1
    matrix.remove_maximal_face(3).unwrap();
    assert_eq!(matrix.len(), 5);
    assert_eq!(matrix.position_of(5).unwrap(), 4);
    assert!(matrix.position_of(3).is_err());
    assert_eq!(
        matrix.barcode(),
        vec![
            Bar { dimension: 0, birth: 0, death: None },
            Bar { dimension: 0, birth: 1, death: Some(4) },
            Bar { dimension: 0, birth: 2, death: Some(3) },
        ]
    );
}

#[test]
fn test_chain_failed_insertion_leaves_state_untouched() {
    // ring Z/6: the edge coefficient 1 against a vertex chain scaled to the
    // zero divisor 3 cannot be eliminated
    let ops = MultiField::new(2, 3).unwrap();
    let mut matrix: ChainMatrix<MultiField> = ChainMatrix::new(ops);
    matrix.insert_boundary(&[]).unwrap();
    matrix.insert_boundary(&[]).unwrap();
    matrix.scale_column(1, 3).unwrap();
    let before = matrix.barcode();
    let err = matrix.insert_boundary(&[(0, -1), (1, 1)]).unwrap_err();
    assert_eq!(err, VineaError::NonInvertible(6));
    assert_eq!(matrix.len(), 2);
    assert_eq!(matrix.barcode(), before);
    assert!(!matrix.is_paired(1).unwrap());
    assert_eq!(rows_of(matrix.ops(), matrix.get_column(1).unwrap()), vec![1]);
    // a divisible boundary still goes through on the same matrix
    matrix.insert_boundary(&[(0, -3), (1, 3)]).unwrap();
    assert_eq!(
        matrix.barcode(),
        vec![
            Bar { dimension: 0, birth: 0, death: None },
            Bar { dimension: 0, birth: 1, death: Some(2) },
        ]
    );
}

#[test]
fn test_chain_mod_5_dependent_swap() {
    let ops = PrimeField::new(5).unwrap();
    let mut matrix = chain_triangle(ops);
    assert_eq!(matrix.vine_swap(4, 5).unwrap(), 4);
    assert_eq!(matrix.barcode(), triangle_bars());
    assert_eq!(matrix.vine_swap(5, 4).unwrap(), 5);
    assert_eq!(matrix.barcode(), triangle_bars());
    assert_eq!(rows_of(&ops, matrix.get_column(4).unwrap()), vec![4]);
}
