use criterion::{Criterion, black_box, criterion_group, criterion_main};

use codelang::classifier::{Backend, Classifier};
use codelang::config::TrainingConfig;
use codelang::corpus::SampleCorpus;
use codelang::features::FrequencyVector;
use codelang::training::Trainer;

const LANGUAGES: &[&str] = &["c", "go", "java", "python", "ruby", "rust"];

fn generate_corpus(samples_per_language: usize, tokens: usize) -> SampleCorpus {
    let mut corpus = SampleCorpus::new();
    for (l, language) in LANGUAGES.iter().enumerate() {
        for s in 0..samples_per_language {
            let mut vector = FrequencyVector::new();
            for t in 0..tokens {
                let value = ((l as f64 * 1.3 + t as f64 * 0.7 + s as f64 * 0.1).sin() + 1.0) * 5.0;
                vector.add(format!("tok{t}"), value.floor());
            }
            corpus.add_sample(*language, vector);
        }
    }
    corpus
}

fn bench_classify(c: &mut Criterion) {
    let corpus = generate_corpus(20, 200);
    let config = TrainingConfig::default().with_threads(1);
    let report = Trainer::new(config)
        .unwrap()
        .train(&corpus, 100)
        .unwrap();
    let query = corpus.samples("rust").unwrap()[3].clone();

    let mut group = c.benchmark_group("classify");
    for backend in Backend::ALL {
        let outcome = report.outcome(backend).unwrap();
        let classifier = outcome.classifier().unwrap();
        group.bench_function(backend.name(), |b| {
            b.iter(|| black_box(classifier.classify(black_box(&query))).len())
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let corpus = generate_corpus(20, 200);
    let trainer = Trainer::new(TrainingConfig::default().with_threads(1)).unwrap();
    let report = trainer.train(&corpus, 100).unwrap();

    let mut group = c.benchmark_group("decode");
    for classifier in report.classifiers() {
        let bytes = classifier.encode();
        let backend = classifier.backend();
        group.bench_function(backend.name(), |b| {
            b.iter(|| black_box(backend.decode(black_box(&bytes)).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_classify, bench_decode);
criterion_main!(benches);
