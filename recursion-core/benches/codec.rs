use ark_bn254::Fr;
use ark_ff::UniformRand;
use ark_std::{rand::Rng, test_rng};
use common::constants::PROOF_BODY_SIZE;
use criterion::Criterion;
use recursion_core::codec::{bytes_to_fields, fields_to_bytes, split_aggregated_proof};

fn random_aggregated_proof(rng: &mut impl Rng, num_public_inputs: usize) -> Vec<u8> {
    let public_inputs: Vec<Fr> = std::iter::repeat_with(|| Fr::rand(rng))
        .take(num_public_inputs)
        .collect();
    let mut buffer = fields_to_bytes(&public_inputs);
    buffer.extend(std::iter::repeat_with(|| rng.gen::<u8>()).take(PROOF_BODY_SIZE));
    buffer
}

fn benchmark_split(c: &mut Criterion, num_public_inputs: usize) {
    c.bench_function(
        &format!("split_aggregated_proof {num_public_inputs} public inputs"),
        |b| {
            b.iter_with_setup(
                || random_aggregated_proof(&mut test_rng(), num_public_inputs),
                |buffer| criterion::black_box(split_aggregated_proof(&buffer)),
            );
        },
    );
}

fn benchmark_bytes_to_fields(c: &mut Criterion, num_fields: usize) {
    c.bench_function(&format!("bytes_to_fields {num_fields} words"), |b| {
        b.iter_with_setup(
            || {
                let mut rng = test_rng();
                let fields: Vec<Fr> = std::iter::repeat_with(|| Fr::rand(&mut rng))
                    .take(num_fields)
                    .collect();
                fields_to_bytes(&fields)
            },
            |bytes| criterion::black_box(bytes_to_fields(&bytes)),
        );
    });
}

fn main() {
    let mut criterion = Criterion::default().configure_from_args();

    benchmark_split(&mut criterion, 1);
    benchmark_split(&mut criterion, 16);
    benchmark_split(&mut criterion, 1024);

    benchmark_bytes_to_fields(&mut criterion, 67);
    benchmark_bytes_to_fields(&mut criterion, 1 << 14);

    criterion.final_summary();
}
