// Field lists for every stored record type.

use std::sync::LazyLock;

use toron_common::{Post, SearchEntry, Show};

use crate::codec::{Codable, Constructor, FieldSet, FieldType, Shape};
use crate::error::CodecError;

static POST_SHAPE: LazyLock<Shape> = LazyLock::new(|| {
    Shape::new(
        "Post",
        [
            ("author", FieldType::Str),
            ("created_utc", FieldType::I64),
            ("fetched", FieldType::Timestamp),
            ("id", FieldType::Str),
            ("is_self", FieldType::Bool),
            ("num_comments", FieldType::I32),
            ("over_18", FieldType::Bool),
            ("permalink", FieldType::Str),
            ("score", FieldType::I32),
            ("selftext", FieldType::optional(FieldType::Str)),
            ("title", FieldType::Str),
            ("url", FieldType::Str),
        ],
    )
});

impl Codable for Post {
    fn shape() -> &'static Shape {
        &POST_SHAPE
    }

    fn to_fields(&self) -> FieldSet {
        FieldSet::new()
            .with("author", self.author.as_str())
            .with("created_utc", self.created_utc)
            .with("fetched", self.fetched)
            .with("id", self.id.as_str())
            .with("is_self", self.is_self)
            .with("num_comments", self.num_comments)
            .with("over_18", self.over_18)
            .with("permalink", self.permalink.as_str())
            .with("score", self.score)
            .with("selftext", self.selftext.clone())
            .with("title", self.title.as_str())
            .with("url", self.url.as_str())
    }

    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor {
            required: &[
                "author",
                "created_utc",
                "fetched",
                "id",
                "is_self",
                "num_comments",
                "over_18",
                "permalink",
                "score",
                "title",
                "url",
            ],
            build: |mut f| {
                Ok(Post {
                    author: f.take("author")?,
                    created_utc: f.take("created_utc")?,
                    fetched: f.take("fetched")?,
                    id: f.take("id")?,
                    is_self: f.take("is_self")?,
                    num_comments: f.take("num_comments")?,
                    over_18: f.take("over_18")?,
                    permalink: f.take("permalink")?,
                    score: f.take("score")?,
                    selftext: f.take_opt("selftext")?,
                    title: f.take("title")?,
                    url: f.take("url")?,
                })
            },
        }]
    }
}

fn show_fields(extra: &[(&'static str, FieldType)]) -> Vec<(&'static str, FieldType)> {
    let mut fields = vec![
        ("id", FieldType::I32),
        ("id_mal", FieldType::optional(FieldType::I32)),
        ("popularity", FieldType::I32),
        ("retrieved", FieldType::Timestamp),
        ("status", FieldType::Str),
        ("synonyms", FieldType::list(FieldType::Str)),
        ("title_english", FieldType::optional(FieldType::Str)),
        ("title_native", FieldType::optional(FieldType::Str)),
        ("title_romaji", FieldType::Str),
    ];
    fields.extend(extra.iter().cloned());
    fields
}

/// Show layout before episode counts, scores and site links were stored.
pub static SHOW_V1_SHAPE: LazyLock<Shape> = LazyLock::new(|| Shape::new("Show", show_fields(&[])));

static SHOW_SHAPE: LazyLock<Shape> = LazyLock::new(|| {
    Shape::new(
        "Show",
        show_fields(&[
            ("average_score", FieldType::I32),
            ("episodes", FieldType::I32),
            ("site_url", FieldType::optional(FieldType::Str)),
        ]),
    )
});

const SHOW_BASE_FIELDS: &[&str] = &[
    "id",
    "popularity",
    "retrieved",
    "status",
    "synonyms",
    "title_romaji",
];

const SHOW_FIELDS: &[&str] = &[
    "average_score",
    "episodes",
    "id",
    "popularity",
    "retrieved",
    "status",
    "synonyms",
    "title_romaji",
];

fn build_show(
    mut f: FieldSet,
    episodes: i32,
    average_score: i32,
) -> Result<Show, CodecError> {
    Ok(Show {
        id: f.take("id")?,
        id_mal: f.take_opt("id_mal")?,
        title_romaji: f.take("title_romaji")?,
        title_english: f.take_opt("title_english")?,
        title_native: f.take_opt("title_native")?,
        synonyms: f.take("synonyms")?,
        popularity: f.take("popularity")?,
        episodes,
        status: f.take("status")?,
        average_score,
        site_url: f.take_opt("site_url")?,
        retrieved: f.take("retrieved")?,
    })
}

impl Codable for Show {
    fn shape() -> &'static Shape {
        &SHOW_SHAPE
    }

    fn to_fields(&self) -> FieldSet {
        FieldSet::new()
            .with("average_score", self.average_score)
            .with("episodes", self.episodes)
            .with("id", self.id)
            .with("id_mal", self.id_mal)
            .with("popularity", self.popularity)
            .with("retrieved", self.retrieved)
            .with("site_url", self.site_url.clone())
            .with("status", self.status.as_str())
            .with("synonyms", self.synonyms.clone())
            .with("title_english", self.title_english.clone())
            .with("title_native", self.title_native.clone())
            .with("title_romaji", self.title_romaji.as_str())
    }

    fn constructors() -> Vec<Constructor<Self>> {
        vec![
            Constructor {
                required: SHOW_FIELDS,
                build: |mut f| {
                    let episodes = f.take("episodes")?;
                    let average_score = f.take("average_score")?;
                    build_show(f, episodes, average_score)
                },
            },
            Constructor {
                required: SHOW_BASE_FIELDS,
                build: |f| build_show(f, 0, 0),
            },
        ]
    }

    fn legacy_shapes() -> Vec<&'static Shape> {
        vec![&*SHOW_V1_SHAPE]
    }
}

static SEARCH_SHAPE: LazyLock<Shape> = LazyLock::new(|| {
    Shape::new(
        "SearchEntry",
        [
            ("query", FieldType::Str),
            ("retrieved", FieldType::Timestamp),
            ("shows", FieldType::list(FieldType::I32)),
        ],
    )
});

impl Codable for SearchEntry {
    fn shape() -> &'static Shape {
        &SEARCH_SHAPE
    }

    fn to_fields(&self) -> FieldSet {
        FieldSet::new()
            .with("query", self.query.as_str())
            .with("retrieved", self.retrieved)
            .with("shows", self.shows.clone())
    }

    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor {
            required: &["query", "retrieved", "shows"],
            build: |mut f| {
                Ok(SearchEntry {
                    query: f.take("query")?,
                    retrieved: f.take("retrieved")?,
                    shows: f.take("shows")?,
                })
            },
        }]
    }
}

/// Secondary index entry pointing at a show's primary id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShowRef {
    pub id: i32,
}

static SHOW_REF_SHAPE: LazyLock<Shape> =
    LazyLock::new(|| Shape::new("ShowRef", [("id", FieldType::I32)]));

impl Codable for ShowRef {
    fn shape() -> &'static Shape {
        &SHOW_REF_SHAPE
    }

    fn to_fields(&self) -> FieldSet {
        FieldSet::new().with("id", self.id)
    }

    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor {
            required: &["id"],
            build: |mut f| Ok(ShowRef { id: f.take("id")? }),
        }]
    }
}
