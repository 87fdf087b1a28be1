//! 분류기 벤치마크

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use survival_core::types::SandboxKind;
use survival_engine::{
    AssetAccess, ContentState, ManifestState, PolicyHeaders, ProbeFacts, classify,
};

fn facts(sandbox: SandboxKind, manifest: ManifestState) -> ProbeFacts {
    ProbeFacts {
        sandbox,
        access: AssetAccess::Ok,
        link_discovered: true,
        manifest,
        policy_headers: PolicyHeaders {
            x_c2_policy: Some(sandbox.declared_policy().to_owned()),
            content_security_policy: true,
            nosniff: true,
        },
        content: ContentState::Observed {
            length: 4096,
            well_formed: true,
            has_claim: true,
        },
    }
}

fn bench_classify(c: &mut Criterion) {
    let survived = facts(SandboxKind::PreserveEmbed, ManifestState::Fetched { aligned: true });
    let broken = facts(SandboxKind::RemoteOnly, ManifestState::Fetched { aligned: false });

    c.bench_function("classify_survived", |b| {
        b.iter(|| classify(black_box(&survived)))
    });
    c.bench_function("classify_broken_manifest", |b| {
        b.iter(|| classify(black_box(&broken)))
    });
}

criterion_group!(benches, bench_classify);
criterion_main!(benches);
