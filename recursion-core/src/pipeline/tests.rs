use std::sync::{Arc, Mutex};
use std::time::Duration;

use ark_bn254::Fr;
use ark_std::Zero;
use common::constants::{AGGREGATION_OBJECT_SIZE, PROOF_BODY_FIELDS, PROOF_BODY_SIZE};
use common::serializable::Serializable;
use tokio::sync::mpsc::UnboundedReceiver;

use super::*;
use crate::backend::{
    BackendOptions, Execution, ReferenceBackend, ReferenceBackendFactory, Witness,
};
use crate::circuit::{ArtifactDirLoader, BuiltinCircuits, CompiledCircuit, InputMap};
use crate::utils::errors::LoadError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FailAt {
    Init,
    Execute,
    FinalProof,
    FinalVerify,
}

/// Wraps the reference backend, records every `destroy` and can fail or
/// stall on demand.
struct RecordingBackend {
    inner: ReferenceBackend,
    destroyed: Arc<Mutex<Vec<String>>>,
    fail: Option<FailAt>,
    stall: Option<Duration>,
}

impl RecordingBackend {
    fn check(&self, at: FailAt) -> Result<(), ProvingError> {
        if self.fail == Some(at) {
            return Err(ProvingError::Backend(format!("injected failure at {at:?}")));
        }
        Ok(())
    }
}

impl ProvingBackend for RecordingBackend {
    fn circuit(&self) -> &CompiledCircuit {
        self.inner.circuit()
    }

    async fn init(&mut self) -> Result<(), ProvingError> {
        self.check(FailAt::Init)?;
        self.inner.init().await
    }

    async fn execute_witness(&self, inputs: InputMap) -> Result<Execution, ProvingError> {
        self.check(FailAt::Execute)?;
        if let Some(stall) = self.stall {
            tokio::time::sleep(stall).await;
        }
        self.inner.execute_witness(inputs).await
    }

    async fn generate_intermediate_proof(&self, witness: Witness) -> Result<ProofData, ProvingError> {
        self.inner.generate_intermediate_proof(witness).await
    }

    async fn verify_intermediate_proof(&self, proof: &ProofData) -> Result<bool, ProvingError> {
        self.inner.verify_intermediate_proof(proof).await
    }

    async fn proof_artifacts_as_fields(
        &self,
        proof: &ProofData,
        num_public_inputs: usize,
    ) -> Result<RecursiveArtifacts, ProvingError> {
        self.inner
            .proof_artifacts_as_fields(proof, num_public_inputs)
            .await
    }

    async fn generate_final_proof(&self, witness: Witness) -> Result<ProofData, ProvingError> {
        self.check(FailAt::FinalProof)?;
        self.inner.generate_final_proof(witness).await
    }

    async fn verify_final_proof(&self, proof: &ProofData) -> Result<bool, ProvingError> {
        self.check(FailAt::FinalVerify)?;
        self.inner.verify_final_proof(proof).await
    }

    fn destroy(&mut self) -> Result<(), ProvingError> {
        self.destroyed
            .lock()
            .unwrap()
            .push(self.inner.circuit().name.clone());
        self.inner.destroy()
    }
}

#[derive(Default)]
struct RecordingFactory {
    destroyed: Arc<Mutex<Vec<String>>>,
    fail: Option<(&'static str, FailAt)>,
    stall: Option<(&'static str, Duration)>,
}

impl RecordingFactory {
    fn failing(circuit: &'static str, at: FailAt) -> Self {
        Self {
            fail: Some((circuit, at)),
            ..Default::default()
        }
    }

    fn destroy_count(&self, circuit: &str) -> usize {
        self.destroyed
            .lock()
            .unwrap()
            .iter()
            .filter(|name| *name == circuit)
            .count()
    }
}

impl BackendFactory for RecordingFactory {
    type Backend = RecordingBackend;

    fn instantiate(
        &self,
        circuit: Arc<CompiledCircuit>,
        options: &BackendOptions,
    ) -> Result<RecordingBackend, ProvingError> {
        let name = circuit.name.clone();
        Ok(RecordingBackend {
            inner: ReferenceBackendFactory.instantiate(circuit, options)?,
            destroyed: Arc::clone(&self.destroyed),
            fail: self.fail.filter(|(target, _)| *target == name).map(|(_, at)| at),
            stall: self
                .stall
                .filter(|(target, _)| *target == name)
                .map(|(_, stall)| stall),
        })
    }
}

fn test_config() -> PipelineConfig {
    PipelineConfig {
        threads: 2,
        ..Default::default()
    }
}

async fn setup(factory: &RecordingFactory, config: &PipelineConfig) -> PipelineContext<RecordingBackend> {
    PipelineContext::setup(&BuiltinCircuits, factory, config, &ProgressReporter::disabled())
        .await
        .unwrap()
}

async fn run(
    factory: &RecordingFactory,
    config: &PipelineConfig,
    x: &str,
    y: &str,
) -> Result<PipelineOutcome, PipelineError> {
    let context = setup(factory, config).await;
    context
        .prove(
            MainInputs::parse(x, y).unwrap(),
            &ProgressReporter::disabled(),
            &CancelToken::new(),
        )
        .await
}

fn drain(receiver: &mut UnboundedReceiver<StageEvent>) -> Vec<(Stage, StageStatus)> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push((event.stage, event.status));
    }
    events
}

#[tokio::test]
async fn e2e_distinct_inputs_verify_recursively() {
    let factory = RecordingFactory::default();
    let outcome = run(&factory, &test_config(), "2", "3").await.unwrap();

    let (main_proof, recursive_inputs, final_proof) = match outcome {
        PipelineOutcome::Verified {
            main_proof,
            recursive_inputs,
            final_proof,
        } => (main_proof, recursive_inputs, final_proof),
        other => panic!("expected a verified outcome, got {other:?}"),
    };
    assert_eq!(main_proof.proof.len(), PROOF_BODY_SIZE);
    assert_eq!(main_proof.public_inputs.len(), 1);

    assert_eq!(recursive_inputs.public_inputs, vec!["0x3".to_string()]);
    assert!(!recursive_inputs.verification_key.is_empty());
    assert_eq!(recursive_inputs.proof.len(), PROOF_BODY_FIELDS);
    assert!(!recursive_inputs.key_hash.is_zero());
    assert!(recursive_inputs.input_aggregation_object.is_empty());

    assert_eq!(final_proof.proof.len(), PROOF_BODY_SIZE);
    assert_eq!(final_proof.public_inputs.len(), AGGREGATION_OBJECT_SIZE);

    assert_eq!(factory.destroy_count("recursive"), 1);
    assert_eq!(factory.destroy_count("main"), 1);
}

#[tokio::test]
async fn e2e_equal_inputs_are_rejected_without_error() {
    let factory = RecordingFactory::default();
    let outcome = run(&factory, &test_config(), "2", "2").await.unwrap();
    assert!(matches!(outcome, PipelineOutcome::MainProofRejected { .. }));
    assert!(!outcome.is_verified());
    assert_eq!(factory.destroy_count("main"), 1);
    assert_eq!(factory.destroy_count("recursive"), 1);
}

#[tokio::test]
async fn stages_can_be_driven_one_by_one() {
    let factory = RecordingFactory::default();
    let mut context = setup(&factory, &test_config()).await;
    let inputs = MainInputs::parse("2", "3").unwrap();

    let main = context.prove_main(&inputs).await.unwrap();
    assert!(main.verified);

    let artifacts = context.encode_for_recursion(&main.proof).await.unwrap();
    assert_eq!(artifacts.proof_as_fields.len(), PROOF_BODY_FIELDS);
    assert!(!artifacts.vk_as_fields.is_empty());
    assert_ne!(artifacts.vk_hash, Fr::zero());

    let recursive_inputs = context
        .recursive_inputs(&artifacts, &inputs, &main.proof)
        .unwrap();
    let final_proof = context.prove_recursive(&recursive_inputs).await.unwrap();

    assert!(context.verify_and_teardown(&final_proof).await.unwrap());
    assert!(context.recursive_prover().is_released());
    assert_eq!(factory.destroy_count("recursive"), 1);

    assert!(matches!(
        context.verify_and_teardown(&final_proof).await,
        Err(ProvingError::Destroyed(_))
    ));
    drop(context);
    assert_eq!(factory.destroy_count("recursive"), 1);
    assert_eq!(factory.destroy_count("main"), 1);
}

#[tokio::test]
async fn two_digit_public_input_depends_on_encoding() {
    let factory = RecordingFactory::default();
    let outcome = run(&factory, &test_config(), "2", "10").await.unwrap();
    let recursive_inputs = match outcome {
        PipelineOutcome::RecursiveProofRejected {
            recursive_inputs, ..
        } => recursive_inputs,
        other => panic!("expected the recursive proof to be rejected, got {other:?}"),
    };
    assert_eq!(recursive_inputs.public_inputs, vec!["0x10".to_string()]);

    let config = PipelineConfig {
        public_input_encoding: PublicInputEncoding::ProvenValue,
        ..test_config()
    };
    let outcome = run(&factory, &config, "2", "10").await.unwrap();
    let recursive_inputs = match outcome {
        PipelineOutcome::Verified {
            recursive_inputs, ..
        } => recursive_inputs,
        other => panic!("expected a verified outcome, got {other:?}"),
    };
    assert_eq!(recursive_inputs.public_inputs, vec!["0xa".to_string()]);
}

#[tokio::test]
async fn hex_public_input_depends_on_encoding() {
    let factory = RecordingFactory::default();
    let (progress, mut receiver) = ProgressReporter::channel();
    let context = PipelineContext::setup(&BuiltinCircuits, &factory, &test_config(), &progress)
        .await
        .unwrap();
    let err = context
        .prove(
            MainInputs::parse("2", "0x3").unwrap(),
            &progress,
            &CancelToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        &err,
        PipelineError::Input(InputError::NotDecimal(name)) if name == "y"
    ));
    assert_eq!(err.stage(), None);
    assert_eq!(
        drain(&mut receiver),
        vec![
            (Stage::Setup, StageStatus::Pending),
            (Stage::Setup, StageStatus::Succeeded),
        ]
    );
    assert_eq!(factory.destroy_count("main"), 1);
    assert_eq!(factory.destroy_count("recursive"), 1);

    let factory = RecordingFactory::default();
    let config = PipelineConfig {
        public_input_encoding: PublicInputEncoding::ProvenValue,
        ..test_config()
    };
    let outcome = run(&factory, &config, "2", "0x3").await.unwrap();
    let recursive_inputs = match outcome {
        PipelineOutcome::Verified {
            recursive_inputs, ..
        } => recursive_inputs,
        other => panic!("expected a verified outcome, got {other:?}"),
    };
    assert_eq!(recursive_inputs.public_inputs, vec!["0x3".to_string()]);
}

#[tokio::test]
async fn progress_events_follow_stage_order() {
    let factory = RecordingFactory::default();
    let (progress, mut receiver) = ProgressReporter::channel();
    let context = PipelineContext::setup(&BuiltinCircuits, &factory, &test_config(), &progress)
        .await
        .unwrap();
    context
        .prove(
            MainInputs::parse("2", "3").unwrap(),
            &progress,
            &CancelToken::new(),
        )
        .await
        .unwrap();

    let expected: Vec<_> = Stage::ALL
        .into_iter()
        .flat_map(|stage| [(stage, StageStatus::Pending), (stage, StageStatus::Succeeded)])
        .collect();
    assert_eq!(drain(&mut receiver), expected);
}

#[tokio::test]
async fn rejection_is_reported_as_terminal_event() {
    let factory = RecordingFactory::default();
    let (progress, mut receiver) = ProgressReporter::channel();
    let context = PipelineContext::setup(&BuiltinCircuits, &factory, &test_config(), &progress)
        .await
        .unwrap();
    context
        .prove(
            MainInputs::parse("4", "4").unwrap(),
            &progress,
            &CancelToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        drain(&mut receiver),
        vec![
            (Stage::Setup, StageStatus::Pending),
            (Stage::Setup, StageStatus::Succeeded),
            (Stage::MainProof, StageStatus::Pending),
            (Stage::MainProof, StageStatus::Rejected),
        ]
    );
}

#[tokio::test]
async fn stage_failure_aborts_and_releases_once() {
    let factory = RecordingFactory::failing("recursive", FailAt::FinalProof);
    let (progress, mut receiver) = ProgressReporter::channel();
    let context = setup(&factory, &test_config()).await;
    let err = context
        .prove(
            MainInputs::parse("2", "3").unwrap(),
            &progress,
            &CancelToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        PipelineError::Stage {
            stage: Stage::RecursiveProof,
            source: ProvingError::Backend(_)
        }
    ));
    assert_eq!(err.stage(), Some(Stage::RecursiveProof));
    assert!(err.to_string().starts_with("recursive proof generation failed"));

    let events = drain(&mut receiver);
    assert!(matches!(
        events.last(),
        Some((Stage::RecursiveProof, StageStatus::Failed(_)))
    ));
    assert!(events.iter().all(|(stage, _)| *stage != Stage::FinalVerification));
    assert_eq!(factory.destroy_count("recursive"), 1);
    assert_eq!(factory.destroy_count("main"), 1);
}

#[tokio::test]
async fn main_stage_failure_names_proof_generation() {
    let factory = RecordingFactory::failing("main", FailAt::Execute);
    let err = run(&factory, &test_config(), "2", "3").await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::MainProof));
    assert!(err.to_string().starts_with("proof generation failed"));
    assert_eq!(factory.destroy_count("main"), 1);
    assert_eq!(factory.destroy_count("recursive"), 1);
}

#[tokio::test]
async fn final_verification_failure_still_tears_down_once() {
    let factory = RecordingFactory::failing("recursive", FailAt::FinalVerify);
    let err = run(&factory, &test_config(), "2", "3").await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::FinalVerification));
    assert_eq!(factory.destroy_count("recursive"), 1);
}

#[tokio::test]
async fn setup_failure_releases_created_backends() {
    let factory = RecordingFactory::failing("recursive", FailAt::Init);
    let (progress, mut receiver) = ProgressReporter::channel();
    let result =
        PipelineContext::setup(&BuiltinCircuits, &factory, &test_config(), &progress).await;
    assert!(matches!(
        result,
        Err(PipelineError::Stage {
            stage: Stage::Setup,
            ..
        })
    ));
    assert_eq!(factory.destroy_count("main"), 1);
    assert_eq!(factory.destroy_count("recursive"), 1);
    assert!(matches!(
        drain(&mut receiver).as_slice(),
        [(Stage::Setup, StageStatus::Pending), (Stage::Setup, StageStatus::Failed(_))]
    ));
}

#[tokio::test]
async fn unknown_circuit_fails_setup() {
    let factory = RecordingFactory::default();
    let config = PipelineConfig {
        main_circuit: "missing".to_string(),
        ..test_config()
    };
    let result =
        PipelineContext::setup(&BuiltinCircuits, &factory, &config, &ProgressReporter::disabled())
            .await;
    let Err(err) = result else {
        panic!("setup should fail for an unknown circuit");
    };
    assert!(matches!(&err, PipelineError::Load(LoadError::NotFound(name)) if name == "missing"));
    assert_eq!(err.stage(), Some(Stage::Setup));
}

#[tokio::test]
async fn cancelled_before_start() {
    let factory = RecordingFactory::default();
    let context = setup(&factory, &test_config()).await;
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = context
        .prove(
            MainInputs::parse("2", "3").unwrap(),
            &ProgressReporter::disabled(),
            &cancel,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Cancelled {
            stage: Stage::MainProof
        }
    ));
    assert_eq!(factory.destroy_count("main"), 1);
    assert_eq!(factory.destroy_count("recursive"), 1);
}

#[tokio::test]
async fn cancelled_mid_stage() {
    let factory = RecordingFactory {
        stall: Some(("main", Duration::from_secs(30))),
        ..Default::default()
    };
    let context = setup(&factory, &test_config()).await;
    let cancel = CancelToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        context.prove(
            MainInputs::parse("2", "3").unwrap(),
            &ProgressReporter::disabled(),
            &cancel,
        ),
    )
    .await
    .unwrap()
    .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Cancelled {
            stage: Stage::MainProof
        }
    ));
    assert_eq!(factory.destroy_count("main"), 1);
}

#[tokio::test]
async fn stalled_stage_times_out() {
    let factory = RecordingFactory {
        stall: Some(("recursive", Duration::from_secs(30))),
        ..Default::default()
    };
    let config = PipelineConfig {
        stage_timeout_secs: Some(1),
        ..test_config()
    };
    let err = run(&factory, &config, "2", "3").await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::TimedOut {
            stage: Stage::RecursiveProof,
            ..
        }
    ));
    assert_eq!(factory.destroy_count("recursive"), 1);
}

#[tokio::test]
async fn runs_from_exported_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let loader = ArtifactDirLoader::new(dir.path());
    for circuit in BuiltinCircuits::all() {
        circuit
            .serialize_to_file(&loader.artifact_path(&circuit.name))
            .unwrap();
    }

    let config = PipelineConfig {
        circuit_dir: Some(dir.path().to_path_buf()),
        ..test_config()
    };
    let context = PipelineContext::setup(
        &loader,
        &ReferenceBackendFactory,
        &config,
        &ProgressReporter::disabled(),
    )
    .await
    .unwrap();
    let outcome = context
        .prove(
            MainInputs::parse("7", "5").unwrap(),
            &ProgressReporter::disabled(),
            &CancelToken::new(),
        )
        .await
        .unwrap();
    assert!(outcome.is_verified());
}
