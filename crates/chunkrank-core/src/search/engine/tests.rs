//! Tests for the SearchEngine.

use super::*;
use crate::embedding::StaticEmbeddingProvider;
use crate::error::ErrorKind;
use crate::search::conditions::{ConditionSet, GroupChatRule, RandomChanceRule, RuleKind};
use crate::search::types::{ChunkGroup, ChunkId};
use crate::test_utils::{angle, axis, engine_with, keyword_engine, lore_chunks, lore_provider};
use std::time::Duration;

fn keyword_options() -> SearchOptions {
    SearchOptions::default()
        .with_mode(SearchMode::Keyword)
        .with_threshold(0.0)
}

fn texts(response: &SearchResponse) -> Vec<&str> {
    response
        .results
        .iter()
        .map(|r| r.chunk.text.as_str())
        .collect()
}

#[tokio::test]
async fn test_keyword_search_scores_matching_chunk_only() {
    let engine = keyword_engine();
    let chunks = lore_chunks();

    let response = engine
        .search(
            "Tell me about the dragon",
            &chunks,
            &keyword_options(),
            &SearchContext::default(),
        )
        .await
        .unwrap();

    // query keywords: "tell", "dragon"
    assert_eq!(response.stats.query_keywords, 2);
    assert_eq!(response.stats.keyword_candidates, 1);
    assert_eq!(response.results.len(), 1);
    let hit = &response.results[0];
    assert_eq!(hit.chunk.id, chunks[0].id);
    assert!((hit.keyword_score.unwrap() - 0.5).abs() < 1e-6);
    assert_eq!(hit.matched_keywords, vec!["dragon"]);
    assert!(hit.vector_score.is_none());
}

#[tokio::test]
async fn test_input_validation_fails_fast() {
    let engine = keyword_engine();
    let ctx = SearchContext::default();
    let options = keyword_options();

    let err = engine.search("   ", &lore_chunks(), &options, &ctx).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyQuery);

    let err = engine.search("dragon", &[], &options, &ctx).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoChunks);

    let err = engine
        .search("dragon", &lore_chunks(), &options.clone().with_top_k(0), &ctx)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOptions);

    assert_eq!(engine.metrics().snapshot().total_failures, 3);
}

#[tokio::test]
async fn test_vector_search_requires_provider() {
    let engine = keyword_engine();
    let options = SearchOptions::default().with_mode(SearchMode::Vector);

    let err = engine
        .search("dragon", &lore_chunks(), &options, &SearchContext::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmbeddingProviderUnavailable);
}

#[tokio::test]
async fn test_vector_search_ranks_by_similarity() {
    let engine = engine_with(Arc::new(lore_provider()));
    let options = SearchOptions::default().with_mode(SearchMode::Vector);

    let response = engine
        .search("kraken", &lore_chunks(), &options, &SearchContext::default())
        .await
        .unwrap();

    assert_eq!(response.results.len(), 1);
    let hit = &response.results[0];
    assert!(hit.chunk.text.contains("kraken"));
    assert!((hit.similarity.unwrap() - 1.0).abs() < 1e-6);
    assert!((hit.score - 1.0).abs() < 1e-6);
    assert_eq!(response.stats.vector_candidates, 3);
}

#[tokio::test]
async fn test_hybrid_merges_union_before_truncation() {
    let provider = lore_provider().with_vector("tavern dragon", axis(3, 1));
    let engine = engine_with(Arc::new(provider));
    let options = SearchOptions::default().with_threshold(0.1);

    let response = engine
        .search("tavern dragon", &lore_chunks(), &options, &SearchContext::default())
        .await
        .unwrap();

    // tavern: 0.5 * 0.3 + 1.0 * 0.7; dragon: 0.5 * 0.3 + 0.0 * 0.7
    assert_eq!(texts(&response).len(), 2);
    assert!(response.results[0].chunk.text.contains("tavern"));
    assert!((response.results[0].score - 0.85).abs() < 1e-5);
    assert!(response.results[1].chunk.text.contains("dragon"));
    assert!((response.results[1].score - 0.15).abs() < 1e-5);
    assert_eq!(response.results[1].keyword_score, Some(0.5));
    assert_eq!(response.results[1].vector_score, Some(0.0));

    assert_eq!(response.stats.mode, SearchMode::Hybrid);
    assert_eq!(response.stats.keyword_candidates, 2);
    assert_eq!(response.stats.merged_candidates, 3);
    assert_eq!(response.stats.above_threshold, 2);
}

#[tokio::test(start_paused = true)]
async fn test_hybrid_phases_run_concurrently() {
    let start = tokio::time::Instant::now();
    let (keyword, vector) = join_phases(
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, SearchError>("keyword")
        },
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, SearchError>("vector")
        },
    )
    .await
    .unwrap();

    assert_eq!((keyword, vector), ("keyword", "vector"));
    assert_eq!(start.elapsed(), Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_hybrid_phase_error_drops_the_other_phase() {
    let start = tokio::time::Instant::now();
    let result = join_phases(
        async { Err::<(), _>(SearchError::EmbeddingProviderUnavailable) },
        async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, SearchError>(())
        },
    )
    .await;

    assert_eq!(result.unwrap_err().kind(), ErrorKind::EmbeddingProviderUnavailable);
    assert!(start.elapsed() < Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_hybrid_latency_tracks_vector_path() {
    let delay = Duration::from_millis(200);
    let provider = Arc::new(
        lore_provider()
            .with_vector("tavern dragon", axis(3, 1))
            .with_delay(delay),
    );
    let engine = engine_with(provider.clone());
    let options = SearchOptions::default().with_threshold(0.1);

    let start = tokio::time::Instant::now();
    let response = engine
        .search("tavern dragon", &lore_chunks(), &options, &SearchContext::default())
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert!(elapsed >= delay);
    assert!(elapsed < delay * 2);
    assert_eq!(provider.calls(), 1);
    assert_eq!(response.stats.keyword_candidates, 2);
    assert_eq!(response.stats.vector_candidates, 3);
}

#[tokio::test]
async fn test_query_embedding_cache_is_shared_across_calls() {
    let provider = Arc::new(lore_provider());
    let engine = engine_with(provider.clone());
    let options = SearchOptions::default().with_mode(SearchMode::Vector);
    let ctx = SearchContext::default();

    let first = engine.search("dragon", &lore_chunks(), &options, &ctx).await.unwrap();
    let second = engine.search("dragon", &lore_chunks(), &options, &ctx).await.unwrap();

    assert!(!first.stats.embedding_cache_hit);
    assert!(second.stats.embedding_cache_hit);
    assert_eq!(provider.calls(), 1);
    assert_eq!(engine.query_cache().len(), 1);
    assert_eq!(engine.metrics().snapshot().query_cache_hits, 1);
}

#[tokio::test]
async fn test_identical_inputs_give_identical_output() {
    let engine = engine_with(Arc::new(lore_provider().with_fallback(vec![0.6, 0.8, 0.0])));
    let options = SearchOptions::default().with_threshold(0.0);
    let ctx = SearchContext::default();

    let first = engine.search("dragon tavern kraken", &lore_chunks(), &options, &ctx).await.unwrap();
    let second = engine.search("dragon tavern kraken", &lore_chunks(), &options, &ctx).await.unwrap();
    assert_eq!(first.results, second.results);
}

#[tokio::test]
async fn test_conditions_filter_before_matching() {
    let engine = keyword_engine();
    let mut chunks = lore_chunks();
    chunks[0] = chunks[0]
        .clone()
        .with_conditions(ConditionSet::all([RuleKind::IsGroupChat(GroupChatRule {
            is_group_chat: true,
        })]));

    let response = engine
        .search("dragon", &chunks, &keyword_options(), &SearchContext::default())
        .await
        .unwrap();
    assert!(response.results.is_empty());
    assert_eq!(response.stats.filtered_by_conditions, 1);

    let group_chat = SearchContext {
        is_group_chat: true,
        ..Default::default()
    };
    let response = engine
        .search("dragon", &chunks, &keyword_options(), &group_chat)
        .await
        .unwrap();
    assert_eq!(response.results.len(), 1);

    let unconditioned = SearchOptions {
        apply_conditions: false,
        ..keyword_options()
    };
    let response = engine
        .search("dragon", &chunks, &unconditioned, &SearchContext::default())
        .await
        .unwrap();
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.stats.filtered_by_conditions, 0);
}

#[tokio::test]
async fn test_seeded_random_chance_is_reproducible() {
    let chunks: Vec<Chunk> = (0..40)
        .map(|i| {
            Chunk::new(format!("dragon lore {i}"))
                .with_keywords(["dragon"])
                .with_conditions(ConditionSet::all([RuleKind::RandomChance(RandomChanceRule {
                    probability: 0.5,
                })]))
        })
        .collect();
    let options = keyword_options().with_top_k(100);
    let ctx = SearchContext::default();

    let run = |seed: u64| {
        let engine = SearchEngine::builder()
            .random_seed(seed)
            .metrics(SearchMetrics::new())
            .build();
        let chunks = chunks.clone();
        let options = options.clone();
        let ctx = ctx.clone();
        async move {
            let response = engine.search("dragon", &chunks, &options, &ctx).await.unwrap();
            response
                .results
                .into_iter()
                .map(|r| r.chunk.text)
                .collect::<Vec<_>>()
        }
    };

    let a = run(7).await;
    let b = run(7).await;
    assert_eq!(a, b);
    assert!(!a.is_empty() && a.len() < 40);
}

#[tokio::test]
async fn test_required_group_member_is_forced() {
    let court = ChunkGroup::new("Court").required();
    let mut chunks = lore_chunks();
    chunks.push(
        Chunk::new("The queen rules from the ivory throne.")
            .with_keywords(["queen"])
            .with_group(court.clone())
            .with_disabled(true),
    );
    chunks.push(
        Chunk::new("The king hunts in the royal forest.")
            .with_keywords(["king"])
            .with_group(court),
    );

    let response = keyword_engine()
        .search("dragon", &chunks, &keyword_options().with_threshold(0.5), &SearchContext::default())
        .await
        .unwrap();

    assert_eq!(response.results.len(), 2);
    let forced = &response.results[1];
    assert!(forced.chunk.text.contains("king"));
    assert_eq!(forced.forced_by_group.as_deref(), Some("Court"));
    assert_eq!(forced.score, 0.0);
    assert_eq!(response.stats.forced_by_group, 1);
}

#[tokio::test]
async fn test_dual_vector_credits_summary_to_parent() {
    let provider = StaticEmbeddingProvider::new("angles").with_fallback(angle(0.0));
    let engine = engine_with(Arc::new(provider));

    let a = Chunk::new("Chapter one in full").with_embedding(angle(80.0));
    let b = Chunk::new("Chapter two in full").with_embedding(angle(10.0));
    let a_summary = Chunk::new("Chapter one summary")
        .with_embedding(angle(0.0))
        .summary_of(&a.id);
    let chunks = vec![a.clone(), b.clone(), a_summary.clone()];

    let options = SearchOptions {
        dual_vector: true,
        ..SearchOptions::default()
            .with_mode(SearchMode::Vector)
            .with_threshold(0.0)
    };
    let response = engine
        .search("chapter", &chunks, &options, &SearchContext::default())
        .await
        .unwrap();

    assert_eq!(response.results.len(), 2);
    let first = &response.results[0];
    assert_eq!(first.chunk.id, a.id);
    assert_eq!(first.via_summary.as_ref(), Some(&a_summary.id));
    let expected = 1.5 / 61.0 + 1.0 / 62.0;
    assert!((first.rrf_score.unwrap() - expected).abs() < 1e-6);
    assert!((first.score - expected / (2.5 / 61.0)).abs() < 1e-5);
    assert!((first.similarity.unwrap() - 1.0).abs() < 1e-5);

    let second = &response.results[1];
    assert_eq!(second.chunk.id, b.id);
    assert!((second.rrf_score.unwrap() - 1.0 / 61.0).abs() < 1e-6);
    assert!(first.rrf_score > second.rrf_score);
}

#[tokio::test]
async fn test_dual_vector_summary_credit_outranks_closer_full_text() {
    let provider = StaticEmbeddingProvider::new("angles").with_fallback(angle(0.0));
    let engine = engine_with(Arc::new(provider));

    let a = Chunk::new("Harbor chapter in full").with_embedding(angle(85.0));
    let b = Chunk::new("Market chapter in full").with_embedding(angle(10.0));
    let a_summary = Chunk::new("Harbor chapter summary")
        .with_embedding(angle(20.0))
        .summary_of(&a.id);
    let chunks = vec![a.clone(), b.clone(), a_summary];

    let options = SearchOptions {
        dual_vector: true,
        ..SearchOptions::default()
            .with_mode(SearchMode::Vector)
            .with_threshold(0.5)
    };
    let response = engine
        .search("harbor", &chunks, &options, &SearchContext::default())
        .await
        .unwrap();

    // a: summary rank 0 + full rank 1; b: full rank 0 only
    let ids: Vec<&ChunkId> = response.results.iter().map(|r| r.id()).collect();
    assert_eq!(ids, vec![&a.id, &b.id]);
    assert!(response.results[0].similarity < response.results[1].similarity);
    assert!(response.results[0].rrf_score > response.results[1].rrf_score);
    // b passes on raw similarity although its scaled fused score is 0.4
    assert!((response.results[1].score - 0.4).abs() < 1e-5);
}

#[tokio::test]
async fn test_auto_search_picks_mode_from_data() {
    let engine = engine_with(Arc::new(lore_provider()));
    let ctx = SearchContext::default();
    let options = SearchOptions::default().with_threshold(0.0);

    let response = engine.auto_search("dragon", &lore_chunks(), &options, &ctx).await.unwrap();
    assert_eq!(response.stats.mode, SearchMode::Hybrid);

    let keyword_only: Vec<Chunk> = lore_chunks()
        .into_iter()
        .map(|mut c| {
            c.embedding = None;
            c
        })
        .collect();
    let response = engine.auto_search("dragon", &keyword_only, &options, &ctx).await.unwrap();
    assert_eq!(response.stats.mode, SearchMode::Keyword);

    let vector_only: Vec<Chunk> = lore_chunks()
        .into_iter()
        .map(|mut c| {
            c.keywords.clear();
            c
        })
        .collect();
    let response = engine.auto_search("dragon", &vector_only, &options, &ctx).await.unwrap();
    assert_eq!(response.stats.mode, SearchMode::Vector);

    let bare = vec![Chunk::new("nothing to search on")];
    let err = engine.auto_search("dragon", &bare, &options, &ctx).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSearchData);
}

#[tokio::test]
async fn test_batch_search_reports_per_query_errors() {
    let engine = keyword_engine();
    let token = CancellationToken::new();

    let results = engine
        .batch_search(
            &["dragon", "", "kraken"],
            &lore_chunks(),
            &keyword_options(),
            &SearchContext::default(),
            &token,
        )
        .await;

    assert_eq!(results.len(), 3);
    assert!(results[0].as_ref().unwrap().results[0].chunk.text.contains("dragon"));
    assert_eq!(results[1].as_ref().unwrap_err().kind(), ErrorKind::EmptyQuery);
    assert!(results[2].as_ref().unwrap().results[0].chunk.text.contains("kraken"));
}

#[tokio::test]
async fn test_batch_search_honors_prior_cancellation() {
    let engine = keyword_engine();
    let token = CancellationToken::new();
    token.cancel();

    let results = engine
        .batch_search(
            &["dragon", "kraken"],
            &lore_chunks(),
            &keyword_options(),
            &SearchContext::default(),
            &token,
        )
        .await;

    assert!(results
        .iter()
        .all(|r| matches!(r, Err(SearchError::Cancelled))));
    assert_eq!(engine.metrics().snapshot().total_cancelled, 2);
}

#[tokio::test(start_paused = true)]
async fn test_batch_search_cancels_in_flight_embedding() {
    let provider = Arc::new(lore_provider().with_delay(Duration::from_secs(30)));
    let engine = engine_with(provider.clone());
    let options = SearchOptions::default().with_mode(SearchMode::Vector);
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let results = engine
        .batch_search(
            &["dragon", "kraken"],
            &lore_chunks(),
            &options,
            &SearchContext::default(),
            &token,
        )
        .await;

    assert_eq!(provider.calls(), 1);
    assert!(matches!(results[0], Err(SearchError::Cancelled)));
    assert!(matches!(results[1], Err(SearchError::Cancelled)));
}

#[tokio::test]
async fn test_from_config_applies_defaults() {
    let config = EngineConfig {
        query_cache_capacity: 7,
        random_seed: Some(1),
        defaults: SearchOptions::default().with_top_k(2),
    };
    let engine = SearchEngine::from_config(&config)
        .metrics(SearchMetrics::new())
        .build();

    assert_eq!(engine.query_cache().capacity(), 7);
    assert_eq!(engine.default_options().top_k, 2);
    assert!(!engine.has_embedding_provider());
}
