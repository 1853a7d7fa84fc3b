use std::collections::{HashMap, HashSet};

use itertools::Itertools;

use crate::api::{
    Interaction, Publication, PublicationId, PublicationStatus, Recommendations, UserId,
};

const NO_OF_RECOMMENDATIONS: usize = 4;

/// Builds recommendations for `user_id` out of all publications.
/// `user_interactions` are the interactions of that user, `interaction_counts` the
/// number of interactions per publication across all users
pub fn recommend(
    user_id: UserId,
    publications: &[Publication],
    user_interactions: &[Interaction],
    interaction_counts: &HashMap<PublicationId, usize>,
) -> Recommendations {
    let interacted: HashSet<PublicationId> = user_interactions
        .iter()
        .filter_map(|interaction| interaction.publication_id)
        .collect();

    let mut genre_weights: HashMap<&str, i64> = HashMap::default();
    let mut authors: HashSet<String> = HashSet::default();
    for publication in publications.iter().filter(|p| interacted.contains(&p.id)) {
        for genre in publication.genres.iter() {
            *genre_weights.entry(genre.as_str()).or_default() += 1;
        }
        authors.insert(publication.author.to_lowercase());
    }

    // Newest first, so that ties below keep the newest publications in front
    let candidates = publications
        .iter()
        .filter(|publication| {
            publication.status == PublicationStatus::Available
                && publication.owner_id != user_id
                && !interacted.contains(&publication.id)
        })
        .sorted_by(|a, b| b.created_at.cmp(&a.created_at))
        .collect_vec();

    let genre_match = candidates
        .iter()
        .map(|publication| {
            let score: i64 = publication
                .genres
                .iter()
                .unique()
                .filter_map(|genre| genre_weights.get(genre.as_str()))
                .sum();
            (*publication, score)
        })
        .filter(|(_, score)| *score > 0)
        .sorted_by_key(|(_, score)| -score)
        .map(|(publication, _)| publication.clone())
        .take(NO_OF_RECOMMENDATIONS)
        .collect_vec();

    let already_recommended: HashSet<PublicationId> =
        genre_match.iter().map(|publication| publication.id).collect();

    let author_match = candidates
        .iter()
        .filter(|publication| {
            authors.contains(&publication.author.to_lowercase())
                && !already_recommended.contains(&publication.id)
        })
        .map(|publication| (*publication).clone())
        .take(NO_OF_RECOMMENDATIONS)
        .collect_vec();

    let most_popular = candidates
        .iter()
        .sorted_by_key(|publication| {
            -(interaction_counts
                .get(&publication.id)
                .cloned()
                .unwrap_or_default() as i64)
        })
        .map(|publication| (*publication).clone())
        .take(NO_OF_RECOMMENDATIONS)
        .collect_vec();

    Recommendations {
        genre_match,
        author_match,
        most_popular,
    }
}
